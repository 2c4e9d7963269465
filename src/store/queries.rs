//! Synchronous SQL used inside store transactions. Every function takes a
//! plain `&Connection` so it runs equally on a `Transaction`.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::Snapshot;
use crate::engine::leaderboard::{RankedEntry, ScoredPick};
use crate::engine::FighterRecord;
use crate::error::{EngineError, EngineResult};
use crate::types::{
    BadgeTier, Event, EventId, EventStatus, Fight, FightHistoryEntry, FightId, FightResult, FightStatus,
    Fighter, FighterId, Outcome, Pick, PickStatus, ResultLabel, SnapshotType, User, UserId,
};

/// Map a TEXT column through `parse`, reporting unknown values as a
/// conversion failure on that column.
fn parse_col<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(EngineError::Corrupt(format!("unexpected value {raw:?}"))),
        )
    })
}

// ── Events / fighters / fights ────────────────────────────────────────

pub fn get_event(conn: &Connection, event_id: EventId) -> EngineResult<Option<Event>> {
    let event = conn
        .query_row(
            "SELECT id, name, event_date, status FROM events WHERE id = ?1",
            params![event_id],
            |row| {
                Ok(Event {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    event_date: row.get(2)?,
                    status: parse_col(row, 3, EventStatus::parse)?,
                })
            },
        )
        .optional()?;
    Ok(event)
}

pub fn set_event_status(conn: &Connection, event_id: EventId, status: EventStatus) -> EngineResult<()> {
    let changed = conn.execute(
        "UPDATE events SET status = ?2 WHERE id = ?1",
        params![event_id, status.as_str()],
    )?;
    if changed == 0 {
        return Err(EngineError::EventNotFound(event_id));
    }
    Ok(())
}

pub fn get_fighter(conn: &Connection, fighter_id: FighterId) -> EngineResult<Option<Fighter>> {
    let fighter = conn
        .query_row(
            "SELECT id, name FROM fighters WHERE id = ?1",
            params![fighter_id],
            |row| {
                Ok(Fighter {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(fighter)
}

const FIGHT_COLUMNS: &str = "f.id, f.event_id, f.fighter1_id, f.fighter2_id, f.scheduled_rounds, f.status,
                             f.fighter1_odds, f.fighter2_odds";

fn row_to_fight(row: &Row<'_>) -> rusqlite::Result<Fight> {
    Ok(Fight {
        id: row.get(0)?,
        event_id: row.get(1)?,
        fighter1_id: row.get(2)?,
        fighter2_id: row.get(3)?,
        scheduled_rounds: row.get(4)?,
        status: parse_col(row, 5, FightStatus::parse)?,
        fighter1_odds: row.get(6)?,
        fighter2_odds: row.get(7)?,
    })
}

pub fn get_fight(conn: &Connection, fight_id: FightId) -> EngineResult<Option<Fight>> {
    let sql = format!("SELECT {FIGHT_COLUMNS} FROM fights f WHERE f.id = ?1");
    Ok(conn.query_row(&sql, params![fight_id], row_to_fight).optional()?)
}

/// Write the denormalized result columns and mark the fight completed.
pub fn mark_fight_completed(
    conn: &Connection,
    fight: &Fight,
    result: &FightResult,
) -> EngineResult<()> {
    conn.execute(
        "UPDATE fights SET status = ?2, result_outcome = ?3, winner_id = ?4, result_method = ?5,
                           result_round = ?6, result_time = ?7, result_referee = ?8,
                           fighter1_result = ?9, fighter2_result = ?10
         WHERE id = ?1",
        params![
            fight.id,
            FightStatus::Completed.as_str(),
            result.outcome.kind(),
            result.outcome.winner(),
            result.method,
            result.round,
            result.time,
            result.referee,
            result.outcome.label_for(fight.fighter1_id).as_str(),
            result.outcome.label_for(fight.fighter2_id).as_str(),
        ],
    )?;
    Ok(())
}

/// Per-side result labels as written on the fight row.
pub fn fight_result_labels(
    conn: &Connection,
    fight_id: FightId,
) -> EngineResult<Option<(ResultLabel, ResultLabel)>> {
    let labels: Option<(Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT fighter1_result, fighter2_result FROM fights WHERE id = ?1",
            params![fight_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(match labels {
        Some((Some(a), Some(b))) => ResultLabel::parse(&a).zip(ResultLabel::parse(&b)),
        _ => None,
    })
}

// ── Fight results ─────────────────────────────────────────────────────

fn row_to_fight_result(row: &Row<'_>) -> rusqlite::Result<FightResult> {
    let kind: String = row.get(2)?;
    let winner: Option<FighterId> = row.get(3)?;
    let outcome = Outcome::from_columns(&kind, winner).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            Box::new(EngineError::Corrupt(format!("outcome {kind:?} winner {winner:?}"))),
        )
    })?;
    Ok(FightResult {
        id: row.get(0)?,
        fight_id: row.get(1)?,
        outcome,
        method: row.get(4)?,
        round: row.get(5)?,
        time: row.get(6)?,
        referee: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn get_fight_result(conn: &Connection, fight_id: FightId) -> EngineResult<Option<FightResult>> {
    let result = conn
        .query_row(
            "SELECT id, fight_id, outcome, winner_id, method, round, time, referee, created_at, updated_at
             FROM fight_results WHERE fight_id = ?1",
            params![fight_id],
            row_to_fight_result,
        )
        .optional()?;
    Ok(result)
}

/// Insert or overwrite the single result row for a fight.
#[allow(clippy::too_many_arguments)]
pub fn upsert_fight_result(
    conn: &Connection,
    fight_id: FightId,
    outcome: Outcome,
    method: &str,
    round: u32,
    time: &str,
    referee: &str,
    now: i64,
) -> EngineResult<FightResult> {
    conn.execute(
        "INSERT INTO fight_results (fight_id, outcome, winner_id, method, round, time, referee,
                                    created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
         ON CONFLICT(fight_id) DO UPDATE SET
            outcome = excluded.outcome,
            winner_id = excluded.winner_id,
            method = excluded.method,
            round = excluded.round,
            time = excluded.time,
            referee = excluded.referee,
            updated_at = excluded.updated_at",
        params![fight_id, outcome.kind(), outcome.winner(), method, round, time, referee, now],
    )?;
    get_fight_result(conn, fight_id)?
        .ok_or_else(|| EngineError::Corrupt(format!("result for fight {fight_id} vanished after upsert")))
}

// ── Picks / users ─────────────────────────────────────────────────────

const PICK_COLUMNS: &str = "p.id, p.user_id, p.fight_id, p.predicted_winner_id, p.predicted_method,
                            p.predicted_round, p.units, p.status, p.is_locked, p.points_awarded";

fn row_to_pick(row: &Row<'_>) -> rusqlite::Result<Pick> {
    Ok(Pick {
        id: row.get(0)?,
        user_id: row.get(1)?,
        fight_id: row.get(2)?,
        predicted_winner_id: row.get(3)?,
        predicted_method: row.get(4)?,
        predicted_round: row.get(5)?,
        units: row.get(6)?,
        status: parse_col(row, 7, PickStatus::parse)?,
        is_locked: row.get(8)?,
        points_awarded: row.get(9)?,
    })
}

pub fn picks_for_fight(conn: &Connection, fight_id: FightId) -> EngineResult<Vec<Pick>> {
    let sql = format!("SELECT {PICK_COLUMNS} FROM picks p WHERE p.fight_id = ?1 ORDER BY p.id");
    let mut stmt = conn.prepare(&sql)?;
    let picks = stmt
        .query_map(params![fight_id], row_to_pick)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(picks)
}

/// Persist a pick's score. Settlement always locks the pick.
pub fn set_pick_points(conn: &Connection, pick_id: i64, points: u32) -> EngineResult<()> {
    conn.execute(
        "UPDATE picks SET points_awarded = ?2, is_locked = 1 WHERE id = ?1",
        params![pick_id, points],
    )?;
    Ok(())
}

/// Overwrite the cached total with the sum over all of the user's picks.
pub fn recompute_user_points(conn: &Connection, user_id: UserId) -> EngineResult<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(points_awarded), 0) FROM picks WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE users SET total_points = ?2 WHERE id = ?1",
        params![user_id, total],
    )?;
    Ok(total)
}

pub fn get_user(conn: &Connection, user_id: UserId) -> EngineResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, total_points, stars, badge, last_progression_at FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    total_points: row.get(2)?,
                    stars: row.get(3)?,
                    badge: parse_col(row, 4, BadgeTier::parse)?,
                    last_progression_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

pub fn all_user_ids(conn: &Connection) -> EngineResult<Vec<UserId>> {
    let mut stmt = conn.prepare("SELECT id FROM users ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<UserId>>>()?;
    Ok(ids)
}

pub fn update_user_progression(
    conn: &Connection,
    user_id: UserId,
    stars: f64,
    badge: BadgeTier,
    now: i64,
) -> EngineResult<()> {
    conn.execute(
        "UPDATE users SET stars = ?2, badge = ?3, last_progression_at = ?4 WHERE id = ?1",
        params![user_id, stars, badge.as_str(), now],
    )?;
    Ok(())
}

pub fn login_count(conn: &Connection, user_id: UserId, start: i64, end: i64) -> EngineResult<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM user_logins WHERE user_id = ?1 AND logged_in_at BETWEEN ?2 AND ?3",
        params![user_id, start, end],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ── Fighter aggregates and history ────────────────────────────────────

pub fn get_fighter_record(conn: &Connection, fighter_id: FighterId) -> EngineResult<Option<FighterRecord>> {
    let record = conn
        .query_row(
            "SELECT id, wins, losses, draws, no_contests, ko_tko_wins, submission_wins, decision_wins,
                    ko_tko_losses, submission_losses, decision_losses, win_streak, loss_streak,
                    longest_win_streak
             FROM fighters WHERE id = ?1",
            params![fighter_id],
            |row| {
                Ok(FighterRecord {
                    fighter_id: row.get(0)?,
                    wins: row.get(1)?,
                    losses: row.get(2)?,
                    draws: row.get(3)?,
                    no_contests: row.get(4)?,
                    ko_tko_wins: row.get(5)?,
                    submission_wins: row.get(6)?,
                    decision_wins: row.get(7)?,
                    ko_tko_losses: row.get(8)?,
                    submission_losses: row.get(9)?,
                    decision_losses: row.get(10)?,
                    win_streak: row.get(11)?,
                    loss_streak: row.get(12)?,
                    longest_win_streak: row.get(13)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

pub fn save_fighter_record(conn: &Connection, record: &FighterRecord) -> EngineResult<()> {
    conn.execute(
        "UPDATE fighters SET wins = ?2, losses = ?3, draws = ?4, no_contests = ?5, ko_tko_wins = ?6,
                             submission_wins = ?7, decision_wins = ?8, ko_tko_losses = ?9,
                             submission_losses = ?10, decision_losses = ?11, win_streak = ?12,
                             loss_streak = ?13, longest_win_streak = ?14
         WHERE id = ?1",
        params![
            record.fighter_id,
            record.wins,
            record.losses,
            record.draws,
            record.no_contests,
            record.ko_tko_wins,
            record.submission_wins,
            record.decision_wins,
            record.ko_tko_losses,
            record.submission_losses,
            record.decision_losses,
            record.win_streak,
            record.loss_streak,
            record.longest_win_streak,
        ],
    )?;
    Ok(())
}

/// Insert a history row unless one already exists for its key.
/// Returns true when a row was created.
pub fn insert_history_if_absent(conn: &Connection, entry: &FightHistoryEntry) -> EngineResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM fight_history WHERE id = ?1)",
        params![entry.id],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO fight_history (id, fight_id, fighter_id, fighter_name, opponent_id, opponent_name,
                                    event_id, event_name, event_date, result, method, round, time,
                                    created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            entry.id,
            entry.fight_id,
            entry.fighter_id,
            entry.fighter_name,
            entry.opponent_id,
            entry.opponent_name,
            entry.event_id,
            entry.event_name,
            entry.event_date,
            entry.result.as_str(),
            entry.method,
            entry.round,
            entry.time,
            entry.created_at,
        ],
    )?;
    Ok(true)
}

pub fn history_for_fighter(conn: &Connection, fighter_id: FighterId) -> EngineResult<Vec<FightHistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, fight_id, fighter_id, fighter_name, opponent_id, opponent_name, event_id, event_name,
                event_date, result, method, round, time, created_at
         FROM fight_history WHERE fighter_id = ?1 ORDER BY event_date DESC, fight_id DESC",
    )?;
    let rows = stmt
        .query_map(params![fighter_id], |row| {
            Ok(FightHistoryEntry {
                id: row.get(0)?,
                fight_id: row.get(1)?,
                fighter_id: row.get(2)?,
                fighter_name: row.get(3)?,
                opponent_id: row.get(4)?,
                opponent_name: row.get(5)?,
                event_id: row.get(6)?,
                event_name: row.get(7)?,
                event_date: row.get(8)?,
                result: parse_col(row, 9, ResultLabel::parse)?,
                method: row.get(10)?,
                round: row.get(11)?,
                time: row.get(12)?,
                created_at: row.get(13)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ── Progression window ────────────────────────────────────────────────

pub fn closed_event_count(conn: &Connection, start: i64, end: i64) -> EngineResult<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE status = ?1 AND event_date BETWEEN ?2 AND ?3",
        params![EventStatus::Closed.as_str(), start, end],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Non-cancelled fights on events closed inside the window.
pub fn eligible_window_fights(conn: &Connection, start: i64, end: i64) -> EngineResult<Vec<Fight>> {
    let sql = format!(
        "SELECT {FIGHT_COLUMNS} FROM fights f JOIN events e ON e.id = f.event_id
         WHERE e.status = ?1 AND e.event_date BETWEEN ?2 AND ?3 AND f.status != ?4
         ORDER BY f.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let fights = stmt
        .query_map(
            params![EventStatus::Closed.as_str(), start, end, FightStatus::Cancelled.as_str()],
            row_to_fight,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(fights)
}

/// The user's active picks on the same fights as [`eligible_window_fights`].
pub fn active_window_picks(conn: &Connection, user_id: UserId, start: i64, end: i64) -> EngineResult<Vec<Pick>> {
    let sql = format!(
        "SELECT {PICK_COLUMNS} FROM picks p
         JOIN fights f ON f.id = p.fight_id
         JOIN events e ON e.id = f.event_id
         WHERE p.user_id = ?1 AND p.status = ?2
           AND e.status = ?3 AND e.event_date BETWEEN ?4 AND ?5 AND f.status != ?6
         ORDER BY p.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let picks = stmt
        .query_map(
            params![
                user_id,
                PickStatus::Active.as_str(),
                EventStatus::Closed.as_str(),
                start,
                end,
                FightStatus::Cancelled.as_str(),
            ],
            row_to_pick,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(picks)
}

/// Recorded progression for (user, window), if one was applied.
pub struct ProgressionRun {
    pub participation_pct: u32,
    pub roi: f64,
    pub old_stars: f64,
    pub new_stars: f64,
    pub old_badge: BadgeTier,
    pub new_badge: BadgeTier,
    pub reason: String,
}

pub fn get_progression_run(
    conn: &Connection,
    user_id: UserId,
    start: i64,
    end: i64,
) -> EngineResult<Option<ProgressionRun>> {
    let run = conn
        .query_row(
            "SELECT participation_pct, roi, old_stars, new_stars, old_badge, new_badge, reason
             FROM progression_runs WHERE user_id = ?1 AND window_start = ?2 AND window_end = ?3",
            params![user_id, start, end],
            |row| {
                Ok(ProgressionRun {
                    participation_pct: row.get(0)?,
                    roi: row.get(1)?,
                    old_stars: row.get(2)?,
                    new_stars: row.get(3)?,
                    old_badge: parse_col(row, 4, BadgeTier::parse)?,
                    new_badge: parse_col(row, 5, BadgeTier::parse)?,
                    reason: row.get(6)?,
                })
            },
        )
        .optional()?;
    Ok(run)
}

pub fn insert_progression_run(
    conn: &Connection,
    user_id: UserId,
    start: i64,
    end: i64,
    run: &ProgressionRun,
    now: i64,
) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO progression_runs (user_id, window_start, window_end, participation_pct, roi,
                                       old_stars, new_stars, old_badge, new_badge, reason, calculated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user_id,
            start,
            end,
            run.participation_pct,
            run.roi,
            run.old_stars,
            run.new_stars,
            run.old_badge.as_str(),
            run.new_badge.as_str(),
            run.reason,
            now,
        ],
    )?;
    Ok(())
}

// ── Leaderboard inputs and snapshots ──────────────────────────────────

const COMPLETED_EVENT_FILTER: &str = "e.status IN ('Completed', 'Closed')";

/// Completed or closed events, most recent first.
pub fn completed_event_ids(conn: &Connection) -> EngineResult<Vec<EventId>> {
    let sql = format!(
        "SELECT e.id FROM events e WHERE {COMPLETED_EVENT_FILTER} ORDER BY e.event_date DESC, e.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<EventId>>>()?;
    Ok(ids)
}

pub fn completed_fight_count(conn: &Connection) -> EngineResult<u32> {
    let sql = format!(
        "SELECT COUNT(*) FROM fights f JOIN events e ON e.id = f.event_id
         WHERE {COMPLETED_EVENT_FILTER} AND f.status != ?1"
    );
    let count: u32 = conn.query_row(&sql, params![FightStatus::Cancelled.as_str()], |row| row.get(0))?;
    Ok(count)
}

/// All of the user's active picks on non-cancelled fights, settled or not.
/// Unsettled picks carry 0 points.
pub fn scored_picks_for_user(conn: &Connection, user_id: UserId) -> EngineResult<Vec<ScoredPick>> {
    let mut stmt = conn.prepare(
        "SELECT f.event_id, p.points_awarded FROM picks p
         JOIN fights f ON f.id = p.fight_id
         WHERE p.user_id = ?1 AND p.status = ?2 AND f.status != ?3",
    )?;
    let picks = stmt
        .query_map(
            params![user_id, PickStatus::Active.as_str(), FightStatus::Cancelled.as_str()],
            |row| {
                Ok(ScoredPick {
                    event_id: row.get(0)?,
                    points_awarded: row.get(1)?,
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(picks)
}

pub fn insert_snapshot(conn: &Connection, snapshot: &Snapshot) -> EngineResult<()> {
    let rankings = serde_json::to_string(&snapshot.rankings)?;
    conn.execute(
        "INSERT INTO leaderboard_snapshots (id, snapshot_type, event_id, created_at, rankings)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            snapshot.id,
            snapshot.snapshot_type.as_str(),
            snapshot.event_id,
            snapshot.created_at,
            rankings,
        ],
    )?;
    Ok(())
}

pub fn latest_snapshot(conn: &Connection, snapshot_type: SnapshotType) -> EngineResult<Option<Snapshot>> {
    let row: Option<(String, Option<EventId>, i64, String)> = conn
        .query_row(
            "SELECT id, event_id, created_at, rankings FROM leaderboard_snapshots
             WHERE snapshot_type = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
            params![snapshot_type.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;
    let Some((id, event_id, created_at, rankings)) = row else {
        return Ok(None);
    };
    let rankings: Vec<RankedEntry> = serde_json::from_str(&rankings)?;
    Ok(Some(Snapshot {
        id,
        snapshot_type,
        event_id,
        created_at,
        rankings,
    }))
}
