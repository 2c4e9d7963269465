//! SQLite persistence for fights, picks, users and the settlement outputs.
//!
//! One connection behind an async mutex. Every multi-statement operation
//! runs on a `rusqlite::Transaction` through [`Store::transaction`]; dropping
//! the transaction on an error path rolls everything back.

pub mod queries;

use rusqlite::{params, Connection, Transaction};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::engine::leaderboard::RankedEntry;
use crate::engine::FighterRecord;
use crate::error::{EngineError, EngineResult};
use crate::types::{
    EventId, EventStatus, FightHistoryEntry, FightId, FightResult, FightStatus, FighterId, PickStatus,
    SnapshotType, User, UserId,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    total_points INTEGER NOT NULL DEFAULT 0,
    stars REAL NOT NULL DEFAULT 0,
    badge TEXT NOT NULL DEFAULT 'none',
    last_progression_at INTEGER
);
CREATE TABLE IF NOT EXISTS user_logins (
    user_id INTEGER NOT NULL,
    logged_in_at INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_user_logins_user_ts ON user_logins(user_id, logged_in_at);
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    event_date INTEGER NOT NULL,
    status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS fighters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    wins INTEGER NOT NULL DEFAULT 0,
    losses INTEGER NOT NULL DEFAULT 0,
    draws INTEGER NOT NULL DEFAULT 0,
    no_contests INTEGER NOT NULL DEFAULT 0,
    ko_tko_wins INTEGER NOT NULL DEFAULT 0,
    submission_wins INTEGER NOT NULL DEFAULT 0,
    decision_wins INTEGER NOT NULL DEFAULT 0,
    ko_tko_losses INTEGER NOT NULL DEFAULT 0,
    submission_losses INTEGER NOT NULL DEFAULT 0,
    decision_losses INTEGER NOT NULL DEFAULT 0,
    win_streak INTEGER NOT NULL DEFAULT 0,
    loss_streak INTEGER NOT NULL DEFAULT 0,
    longest_win_streak INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS fights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL,
    fighter1_id INTEGER NOT NULL,
    fighter2_id INTEGER NOT NULL,
    scheduled_rounds INTEGER NOT NULL DEFAULT 3,
    status TEXT NOT NULL DEFAULT 'Scheduled',
    fighter1_odds TEXT,
    fighter2_odds TEXT,
    result_outcome TEXT,
    winner_id INTEGER,
    result_method TEXT,
    result_round INTEGER,
    result_time TEXT,
    result_referee TEXT,
    fighter1_result TEXT,
    fighter2_result TEXT,
    FOREIGN KEY (event_id) REFERENCES events(id)
);
CREATE INDEX IF NOT EXISTS idx_fights_event ON fights(event_id);
CREATE TABLE IF NOT EXISTS fight_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fight_id INTEGER UNIQUE NOT NULL,
    outcome TEXT NOT NULL,
    winner_id INTEGER,
    method TEXT NOT NULL,
    round INTEGER NOT NULL,
    time TEXT NOT NULL,
    referee TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (fight_id) REFERENCES fights(id)
);
CREATE TABLE IF NOT EXISTS picks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    fight_id INTEGER NOT NULL,
    predicted_winner_id INTEGER NOT NULL,
    predicted_method TEXT NOT NULL,
    predicted_round INTEGER,
    units REAL NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'active',
    is_locked INTEGER NOT NULL DEFAULT 0,
    points_awarded INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (fight_id) REFERENCES fights(id)
);
CREATE INDEX IF NOT EXISTS idx_picks_fight ON picks(fight_id);
CREATE INDEX IF NOT EXISTS idx_picks_user ON picks(user_id);
CREATE TABLE IF NOT EXISTS fight_history (
    id TEXT PRIMARY KEY,
    fight_id INTEGER NOT NULL,
    fighter_id INTEGER NOT NULL,
    fighter_name TEXT NOT NULL,
    opponent_id INTEGER NOT NULL,
    opponent_name TEXT NOT NULL,
    event_id INTEGER NOT NULL,
    event_name TEXT NOT NULL,
    event_date INTEGER NOT NULL,
    result TEXT NOT NULL,
    method TEXT NOT NULL,
    round INTEGER NOT NULL,
    time TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_fight_history_fighter ON fight_history(fighter_id, event_date DESC);
CREATE TABLE IF NOT EXISTS progression_runs (
    user_id INTEGER NOT NULL,
    window_start INTEGER NOT NULL,
    window_end INTEGER NOT NULL,
    participation_pct INTEGER NOT NULL,
    roi REAL NOT NULL,
    old_stars REAL NOT NULL,
    new_stars REAL NOT NULL,
    old_badge TEXT NOT NULL,
    new_badge TEXT NOT NULL,
    reason TEXT NOT NULL,
    calculated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, window_start, window_end)
);
CREATE TABLE IF NOT EXISTS leaderboard_snapshots (
    id TEXT PRIMARY KEY,
    snapshot_type TEXT NOT NULL,
    event_id INTEGER,
    created_at INTEGER NOT NULL,
    rankings TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snapshots_type_ts ON leaderboard_snapshots(snapshot_type, created_at DESC);
";

/// Immutable ranked leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub id: String,
    pub snapshot_type: SnapshotType,
    pub event_id: Option<EventId>,
    pub created_at: i64,
    pub rankings: Vec<RankedEntry>,
}

/// Fight as created by event-management tooling.
#[derive(Debug, Clone)]
pub struct NewFight {
    pub event_id: EventId,
    pub fighter1_id: FighterId,
    pub fighter2_id: FighterId,
    pub scheduled_rounds: u32,
    pub fighter1_odds: Option<String>,
    pub fighter2_odds: Option<String>,
}

/// Pick as submitted through the pick routes.
#[derive(Debug, Clone)]
pub struct NewPick {
    pub user_id: UserId,
    pub fight_id: FightId,
    pub predicted_winner_id: FighterId,
    pub predicted_method: String,
    pub predicted_round: Option<u32>,
    pub units: f64,
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(db_path: &str) -> EngineResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::init(conn)
    }

    pub fn open_in_memory() -> EngineResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> EngineResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` inside one transaction. Commits only if `f` succeeds.
    pub async fn transaction<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> EngineResult<T>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Read-only access outside an explicit transaction.
    pub async fn read<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Connection) -> EngineResult<T>,
    {
        let conn = self.conn.lock().await;
        f(&conn)
    }

    // ── Collaborator writes ────────────────────────────────────────────

    pub async fn insert_user(&self, username: &str) -> EngineResult<UserId> {
        let conn = self.conn.lock().await;
        conn.execute("INSERT INTO users (username) VALUES (?1)", params![username])?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn record_login(&self, user_id: UserId, at: i64) -> EngineResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO user_logins (user_id, logged_in_at) VALUES (?1, ?2)",
            params![user_id, at],
        )?;
        Ok(())
    }

    pub async fn insert_event(&self, name: &str, event_date: i64, status: EventStatus) -> EngineResult<EventId> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO events (name, event_date, status) VALUES (?1, ?2, ?3)",
            params![name, event_date, status.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn set_event_status(&self, event_id: EventId, status: EventStatus) -> EngineResult<()> {
        let conn = self.conn.lock().await;
        queries::set_event_status(&conn, event_id, status)
    }

    pub async fn insert_fighter(&self, name: &str) -> EngineResult<FighterId> {
        let conn = self.conn.lock().await;
        conn.execute("INSERT INTO fighters (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn insert_fight(&self, fight: &NewFight) -> EngineResult<FightId> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO fights (event_id, fighter1_id, fighter2_id, scheduled_rounds, status,
                                 fighter1_odds, fighter2_odds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                fight.event_id,
                fight.fighter1_id,
                fight.fighter2_id,
                fight.scheduled_rounds,
                FightStatus::Scheduled.as_str(),
                fight.fighter1_odds,
                fight.fighter2_odds,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn set_fight_status(&self, fight_id: FightId, status: FightStatus) -> EngineResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE fights SET status = ?2 WHERE id = ?1",
            params![fight_id, status.as_str()],
        )?;
        if changed == 0 {
            return Err(EngineError::FightNotFound(fight_id));
        }
        Ok(())
    }

    pub async fn insert_pick(&self, pick: &NewPick) -> EngineResult<i64> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO picks (user_id, fight_id, predicted_winner_id, predicted_method,
                                predicted_round, units, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                pick.user_id,
                pick.fight_id,
                pick.predicted_winner_id,
                pick.predicted_method,
                pick.predicted_round,
                pick.units,
                PickStatus::Active.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn void_pick(&self, pick_id: i64) -> EngineResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE picks SET status = ?2 WHERE id = ?1",
            params![pick_id, PickStatus::Voided.as_str()],
        )?;
        Ok(())
    }

    // ── Reads ──────────────────────────────────────────────────────────

    pub async fn user(&self, user_id: UserId) -> EngineResult<Option<User>> {
        self.read(|conn| queries::get_user(conn, user_id)).await
    }

    pub async fn fight_result(&self, fight_id: FightId) -> EngineResult<Option<FightResult>> {
        self.read(|conn| queries::get_fight_result(conn, fight_id)).await
    }

    pub async fn fighter_record(&self, fighter_id: FighterId) -> EngineResult<Option<FighterRecord>> {
        self.read(|conn| queries::get_fighter_record(conn, fighter_id)).await
    }

    pub async fn fight_history_for(&self, fighter_id: FighterId) -> EngineResult<Vec<FightHistoryEntry>> {
        self.read(|conn| queries::history_for_fighter(conn, fighter_id)).await
    }

    pub async fn picks_for_fight(&self, fight_id: FightId) -> EngineResult<Vec<crate::types::Pick>> {
        self.read(|conn| queries::picks_for_fight(conn, fight_id)).await
    }

    pub async fn latest_snapshot(&self, snapshot_type: SnapshotType) -> EngineResult<Option<Snapshot>> {
        self.read(|conn| queries::latest_snapshot(conn, snapshot_type)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_creates_schema() {
        let store = Store::open_in_memory().unwrap();
        let tables: i64 = store
            .read(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert!(tables >= 10, "got {tables}");
    }

    #[tokio::test]
    async fn test_insert_and_read_user() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_user("alice").await.unwrap();
        let user = store.user(id).await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.total_points, 0);
        assert_eq!(user.stars, 0.0);
        assert_eq!(user.badge, crate::types::BadgeTier::None);
        assert!(store.user(id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_transaction_rolls_back() {
        let store = Store::open_in_memory().unwrap();
        let result: EngineResult<()> = store
            .transaction(|tx| {
                tx.execute("INSERT INTO users (username) VALUES ('ghost')", [])?;
                Err(EngineError::Corrupt("boom".into()))
            })
            .await;
        assert!(result.is_err());
        let count: i64 = store
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_set_fight_status_unknown_fight() {
        let store = Store::open_in_memory().unwrap();
        let err = store.set_fight_status(99, FightStatus::Cancelled).await.unwrap_err();
        assert!(matches!(err, EngineError::FightNotFound(99)));
    }
}
