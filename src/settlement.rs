//! Fight-result settlement.
//!
//! `finalize_fight_result` is the single write path run when an admin enters
//! (or corrects) a result. Everything it touches commits in one transaction.

use chrono::Utc;
use rusqlite::Connection;
use std::collections::BTreeSet;

use crate::engine::calculate_points;
use crate::error::{EngineError, EngineResult};
use crate::store::{queries, Store};
use crate::types::{
    Fight, FightHistoryEntry, FightId, FightResult, Fighter, FighterId, MethodCategory, Outcome,
    PickStatus, ResultPayload,
};

/// What one settlement run changed, for logging.
#[derive(Debug, Clone)]
struct SettlementSummary {
    result: FightResult,
    picks_scored: usize,
    users_updated: usize,
    history_created: usize,
}

/// Persist a fight's result and settle everything downstream of it.
///
/// Safe to call again with the same or a corrected payload: the result row
/// is upserted, pick points and user totals are recomputed from scratch, and
/// history rows (and the fighter aggregates tied to them) are only written
/// the first time.
pub async fn finalize_fight_result(
    store: &Store,
    fight_id: FightId,
    payload: &ResultPayload,
) -> EngineResult<FightResult> {
    let now = Utc::now().timestamp();

    let settled = store
        .transaction(|tx| settle(tx, fight_id, payload, now))
        .await;

    match settled {
        Ok(summary) => {
            tracing::info!(
                fight_id,
                outcome = summary.result.outcome.kind(),
                method = %summary.result.method,
                round = summary.result.round,
                picks = summary.picks_scored,
                users = summary.users_updated,
                history_rows = summary.history_created,
                "fight settled"
            );
            Ok(summary.result)
        }
        Err(e) => {
            tracing::warn!(fight_id, code = e.code(), error = %e, "settlement rolled back");
            Err(e)
        }
    }
}

fn settle(
    conn: &Connection,
    fight_id: FightId,
    payload: &ResultPayload,
    now: i64,
) -> EngineResult<SettlementSummary> {
    let fight = queries::get_fight(conn, fight_id)?.ok_or(EngineError::FightNotFound(fight_id))?;
    let outcome = Outcome::from_winner(payload.winner.as_deref())?;
    if let Outcome::Decisive(winner) = outcome {
        if !fight.has_participant(winner) {
            return Err(EngineError::WinnerNotInFight { fight: fight_id, winner });
        }
    }

    let result = queries::upsert_fight_result(
        conn,
        fight_id,
        outcome,
        payload.method.trim(),
        payload.round,
        payload.time.trim(),
        payload.referee.trim(),
        now,
    )?;

    let picks = queries::picks_for_fight(conn, fight_id)?;
    let mut users = BTreeSet::new();
    for pick in &picks {
        let points = match pick.status {
            PickStatus::Active => calculate_points(pick, &result),
            PickStatus::Voided => 0,
        };
        queries::set_pick_points(conn, pick.id, points)?;
        users.insert(pick.user_id);
        tracing::debug!(fight_id, pick_id = pick.id, user_id = pick.user_id, points, "pick scored");
    }
    for &user_id in &users {
        let total = queries::recompute_user_points(conn, user_id)?;
        tracing::debug!(user_id, total, "user points recomputed");
    }

    queries::mark_fight_completed(conn, &fight, &result)?;

    let history_created = record_history(conn, &fight, &result, now)?;

    Ok(SettlementSummary {
        result,
        picks_scored: picks.len(),
        users_updated: users.len(),
        history_created,
    })
}

/// Write one history row per participant and, for each row created now,
/// fold the outcome into that fighter's aggregate record.
fn record_history(conn: &Connection, fight: &Fight, result: &FightResult, now: i64) -> EngineResult<usize> {
    let event = queries::get_event(conn, fight.event_id)?.ok_or(EngineError::EventNotFound(fight.event_id))?;
    let fighter1 = load_fighter(conn, fight.fighter1_id)?;
    let fighter2 = load_fighter(conn, fight.fighter2_id)?;
    let method = MethodCategory::normalize(&result.method);

    let mut created = 0;
    for (me, opponent) in [(&fighter1, &fighter2), (&fighter2, &fighter1)] {
        let entry = FightHistoryEntry {
            id: FightHistoryEntry::key(fight.id, me.id),
            fight_id: fight.id,
            fighter_id: me.id,
            fighter_name: me.name.clone(),
            opponent_id: opponent.id,
            opponent_name: opponent.name.clone(),
            event_id: event.id,
            event_name: event.name.clone(),
            event_date: event.event_date,
            result: result.outcome.label_for(me.id),
            method: result.method.clone(),
            round: result.round,
            time: result.time.clone(),
            created_at: now,
        };
        if !queries::insert_history_if_absent(conn, &entry)? {
            tracing::debug!(fight_id = fight.id, fighter_id = me.id, "history row exists, record untouched");
            continue;
        }
        created += 1;
        apply_to_record(conn, me.id, result.outcome, &method)?;
    }
    Ok(created)
}

fn load_fighter(conn: &Connection, fighter_id: FighterId) -> EngineResult<Fighter> {
    queries::get_fighter(conn, fighter_id)?
        .ok_or_else(|| EngineError::Corrupt(format!("fighter {fighter_id} referenced by fight is missing")))
}

/// Read-modify-write of one fighter's aggregate.
fn apply_to_record(
    conn: &Connection,
    fighter_id: FighterId,
    outcome: Outcome,
    method: &MethodCategory,
) -> EngineResult<()> {
    let mut record = queries::get_fighter_record(conn, fighter_id)?
        .ok_or_else(|| EngineError::Corrupt(format!("fighter {fighter_id} has no record")))?;
    match outcome {
        Outcome::Decisive(winner) if winner == fighter_id => record.record_win(method),
        Outcome::Decisive(_) => record.record_loss(method),
        Outcome::Draw => record.record_draw(),
        Outcome::NoContest => record.record_no_contest(),
    }
    queries::save_fighter_record(conn, &record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewFight, NewPick};
    use crate::types::{EventStatus, FightStatus, ResultLabel};

    struct Card {
        store: Store,
        fight: FightId,
        red: FighterId,
        blue: FighterId,
        alice: i64,
        bob: i64,
    }

    async fn card() -> Card {
        let store = Store::open_in_memory().unwrap();
        let event = store.insert_event("Fight Night 1", 1_700_000_000, EventStatus::Live).await.unwrap();
        let red = store.insert_fighter("Red Corner").await.unwrap();
        let blue = store.insert_fighter("Blue Corner").await.unwrap();
        let fight = store
            .insert_fight(&NewFight {
                event_id: event,
                fighter1_id: red,
                fighter2_id: blue,
                scheduled_rounds: 3,
                fighter1_odds: Some("-150".into()),
                fighter2_odds: Some("+130".into()),
            })
            .await
            .unwrap();
        let alice = store.insert_user("alice").await.unwrap();
        let bob = store.insert_user("bob").await.unwrap();
        Card {
            store,
            fight,
            red,
            blue,
            alice,
            bob,
        }
    }

    fn payload(winner: &str, method: &str, round: u32) -> ResultPayload {
        ResultPayload {
            winner: Some(winner.to_string()),
            method: method.to_string(),
            round,
            time: "5:00".to_string(),
            referee: "Marc Goddard".to_string(),
        }
    }

    async fn pick(c: &Card, user: i64, winner: FighterId, method: &str, round: Option<u32>) -> i64 {
        c.store
            .insert_pick(&NewPick {
                user_id: user,
                fight_id: c.fight,
                predicted_winner_id: winner,
                predicted_method: method.to_string(),
                predicted_round: round,
                units: 1.0,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_fight_is_not_found() {
        let c = card().await;
        let err = finalize_fight_result(&c.store, 999, &payload("draw", "dec", 3)).await.unwrap_err();
        assert!(matches!(err, EngineError::FightNotFound(999)));
        assert_eq!(err.code(), "FIGHT_NOT_FOUND");

        // The fight is resolved before the winner is read.
        let err = finalize_fight_result(&c.store, 999, &payload("red corner", "KO", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FightNotFound(999)));
    }

    #[tokio::test]
    async fn test_winner_outside_fight_rolls_back() {
        let c = card().await;
        pick(&c, c.alice, c.red, "dec", None).await;
        let err = finalize_fight_result(&c.store, c.fight, &payload("4242", "KO", 1)).await.unwrap_err();
        assert!(matches!(err, EngineError::WinnerNotInFight { .. }));
        assert!(c.store.fight_result(c.fight).await.unwrap().is_none());
        let picks = c.store.picks_for_fight(c.fight).await.unwrap();
        assert!(!picks[0].is_locked);
    }

    #[tokio::test]
    async fn test_decisive_result_scores_and_locks() {
        let c = card().await;
        pick(&c, c.alice, c.red, "dec", None).await;
        pick(&c, c.bob, c.blue, "ko", Some(2)).await;

        let result = finalize_fight_result(&c.store, c.fight, &payload(&c.red.to_string(), "Unanimous Decision", 3))
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Decisive(c.red));

        let picks = c.store.picks_for_fight(c.fight).await.unwrap();
        assert!(picks.iter().all(|p| p.is_locked));
        assert_eq!(picks[0].points_awarded, 6);
        assert_eq!(picks[1].points_awarded, 0);
        assert_eq!(c.store.user(c.alice).await.unwrap().unwrap().total_points, 6);
        assert_eq!(c.store.user(c.bob).await.unwrap().unwrap().total_points, 0);

        let labels = c
            .store
            .read(|conn| queries::fight_result_labels(conn, c.fight))
            .await
            .unwrap();
        assert_eq!(labels, Some((ResultLabel::Win, ResultLabel::Loss)));
        let fight = c.store.read(|conn| queries::get_fight(conn, c.fight)).await.unwrap().unwrap();
        assert_eq!(fight.status, FightStatus::Completed);
    }

    #[tokio::test]
    async fn test_refinalize_is_idempotent() {
        let c = card().await;
        pick(&c, c.alice, c.red, "KO", Some(1)).await;
        let p = payload(&c.red.to_string(), "KO/TKO", 1);

        let first = finalize_fight_result(&c.store, c.fight, &p).await.unwrap();
        let second = finalize_fight_result(&c.store, c.fight, &p).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.outcome, second.outcome);
        assert_eq!(c.store.user(c.alice).await.unwrap().unwrap().total_points, 6);

        assert_eq!(c.store.fight_history_for(c.red).await.unwrap().len(), 1);
        assert_eq!(c.store.fight_history_for(c.blue).await.unwrap().len(), 1);
        let red = c.store.fighter_record(c.red).await.unwrap().unwrap();
        assert_eq!(red.wins, 1);
        assert_eq!(red.ko_tko_wins, 1);
        let blue = c.store.fighter_record(c.blue).await.unwrap().unwrap();
        assert_eq!(blue.losses, 1);
        assert_eq!(blue.loss_streak, 1);
    }

    #[tokio::test]
    async fn test_correction_rescores_picks() {
        let c = card().await;
        pick(&c, c.alice, c.red, "sub", Some(2)).await;
        pick(&c, c.bob, c.blue, "sub", Some(2)).await;

        finalize_fight_result(&c.store, c.fight, &payload(&c.red.to_string(), "Submission", 2))
            .await
            .unwrap();
        assert_eq!(c.store.user(c.alice).await.unwrap().unwrap().total_points, 6);

        let corrected = finalize_fight_result(&c.store, c.fight, &payload(&c.blue.to_string(), "Submission", 2))
            .await
            .unwrap();
        assert_eq!(corrected.outcome, Outcome::Decisive(c.blue));
        assert_eq!(c.store.user(c.alice).await.unwrap().unwrap().total_points, 0);
        assert_eq!(c.store.user(c.bob).await.unwrap().unwrap().total_points, 6);
    }

    #[tokio::test]
    async fn test_draw_zeroes_picks_and_counts_draws() {
        let c = card().await;
        pick(&c, c.alice, c.red, "dec", None).await;
        finalize_fight_result(&c.store, c.fight, &payload("draw", "Split Decision", 3))
            .await
            .unwrap();

        let picks = c.store.picks_for_fight(c.fight).await.unwrap();
        assert_eq!(picks[0].points_awarded, 0);
        for fighter in [c.red, c.blue] {
            let rec = c.store.fighter_record(fighter).await.unwrap().unwrap();
            assert_eq!(rec.draws, 1);
            assert_eq!(rec.wins + rec.losses, 0);
            let history = c.store.fight_history_for(fighter).await.unwrap();
            assert_eq!(history[0].result, ResultLabel::Draw);
        }
    }

    #[tokio::test]
    async fn test_no_contest_only_touches_no_contest_counter() {
        let c = card().await;
        finalize_fight_result(&c.store, c.fight, &payload("no_contest", "Overturned", 2))
            .await
            .unwrap();
        let rec = c.store.fighter_record(c.red).await.unwrap().unwrap();
        assert_eq!(rec.no_contests, 1);
        assert_eq!(rec.wins + rec.losses + rec.draws, 0);
        let history = c.store.fight_history_for(c.blue).await.unwrap();
        assert_eq!(history[0].result, ResultLabel::NoContest);
        assert_eq!(history[0].opponent_name, "Red Corner");
    }

    #[tokio::test]
    async fn test_voided_pick_scores_zero() {
        let c = card().await;
        let id = pick(&c, c.alice, c.red, "dec", None).await;
        c.store.void_pick(id).await.unwrap();
        finalize_fight_result(&c.store, c.fight, &payload(&c.red.to_string(), "Decision", 3))
            .await
            .unwrap();
        let picks = c.store.picks_for_fight(c.fight).await.unwrap();
        assert_eq!(picks[0].points_awarded, 0);
        assert!(picks[0].is_locked);
    }

    #[tokio::test]
    async fn test_unparseable_winner_rejected_before_writing() {
        let c = card().await;
        let err = finalize_fight_result(&c.store, c.fight, &payload("red corner", "KO", 1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_RESULT");
        assert!(c.store.fight_result(c.fight).await.unwrap().is_none());
    }
}
