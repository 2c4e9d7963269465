//! Monthly star / badge progression.
//!
//! Reads settled fights and picks for a window, applies the rules in
//! [`crate::engine::progression`] and persists the new standing together with
//! a run record, so the same (user, window) is never applied twice.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use futures_util::stream::{self, StreamExt};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::config::ProgressionConfig;
use crate::engine::progression::{advance, compute_roi, participation_pct, SettledPick, Standing};
use crate::error::{EngineError, EngineResult};
use crate::store::queries::{self, ProgressionRun};
use crate::store::Store;
use crate::types::{BadgeTier, User, UserId};

/// Source of login counts; sessions are owned by the auth layer.
#[async_trait]
pub trait LoginActivity: Send + Sync {
    async fn login_count(&self, user_id: UserId, start: i64, end: i64) -> EngineResult<u32>;
}

#[async_trait]
impl LoginActivity for Store {
    async fn login_count(&self, user_id: UserId, start: i64, end: i64) -> EngineResult<u32> {
        self.read(|conn| queries::login_count(conn, user_id, start, end)).await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionResult {
    pub user_id: UserId,
    pub window_start: i64,
    pub window_end: i64,
    pub participation_pct: u32,
    pub roi: f64,
    pub old_stars: f64,
    pub new_stars: f64,
    pub old_badge: BadgeTier,
    pub new_badge: BadgeTier,
    pub reason: String,
    /// False for no-op results (nothing settled in the window).
    pub applied: bool,
}

impl ProgressionResult {
    fn no_op(user: &User, start: i64, end: i64, reason: String) -> Self {
        Self {
            user_id: user.id,
            window_start: start,
            window_end: end,
            participation_pct: 0,
            roi: 0.0,
            old_stars: user.stars,
            new_stars: user.stars,
            old_badge: user.badge,
            new_badge: user.badge,
            reason,
            applied: false,
        }
    }

    fn from_run(user_id: UserId, start: i64, end: i64, run: ProgressionRun) -> Self {
        Self {
            user_id,
            window_start: start,
            window_end: end,
            participation_pct: run.participation_pct,
            roi: run.roi,
            old_stars: run.old_stars,
            new_stars: run.new_stars,
            old_badge: run.old_badge,
            new_badge: run.new_badge,
            reason: run.reason,
            applied: true,
        }
    }
}

/// Inclusive unix-second bounds of a calendar month (UTC).
pub fn month_window(year: i32, month: u32) -> Option<(i64, i64)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let start = first.and_hms_opt(0, 0, 0)?.and_utc().timestamp();
    let end = next.and_hms_opt(0, 0, 0)?.and_utc().timestamp() - 1;
    Some((start, end))
}

fn fmt_day(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub struct ProgressionEngine<'a> {
    store: &'a Store,
    logins: &'a dyn LoginActivity,
    config: &'a ProgressionConfig,
    max_concurrency: usize,
}

impl<'a> ProgressionEngine<'a> {
    pub fn new(
        store: &'a Store,
        logins: &'a dyn LoginActivity,
        config: &'a ProgressionConfig,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            logins,
            config,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Compute and persist one user's progression for `[start, end]`.
    pub async fn calculate_user_progression(
        &self,
        user_id: UserId,
        start: i64,
        end: i64,
    ) -> EngineResult<ProgressionResult> {
        let logins = self.logins.login_count(user_id, start, end).await?;
        let now = chrono::Utc::now().timestamp();
        let config = self.config;

        let result = self
            .store
            .transaction(|tx| progress_user(tx, config, user_id, start, end, logins, now))
            .await?;

        tracing::info!(
            user_id,
            participation = result.participation_pct,
            roi = result.roi,
            old_stars = result.old_stars,
            new_stars = result.new_stars,
            new_badge = %result.new_badge,
            applied = result.applied,
            "progression calculated"
        );
        Ok(result)
    }

    /// Progression for every user. One user's failure is logged and skipped.
    pub async fn run_monthly_progression(&self, start: i64, end: i64) -> EngineResult<Vec<ProgressionResult>> {
        let user_ids = self.store.read(queries::all_user_ids).await?;
        let total = user_ids.len();

        let outcomes: Vec<(UserId, EngineResult<ProgressionResult>)> = stream::iter(user_ids)
            .map(|user_id| async move { (user_id, self.calculate_user_progression(user_id, start, end).await) })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut results = Vec::with_capacity(total);
        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => tracing::warn!(user_id, error = %e, "progression failed for user, skipping"),
            }
        }
        results.sort_by_key(|r| r.user_id);

        tracing::info!(
            window_start = %fmt_day(start),
            window_end = %fmt_day(end),
            users = total,
            succeeded = results.len(),
            "monthly progression finished"
        );
        Ok(results)
    }
}

fn progress_user(
    conn: &Connection,
    config: &ProgressionConfig,
    user_id: UserId,
    start: i64,
    end: i64,
    logins: u32,
    now: i64,
) -> EngineResult<ProgressionResult> {
    let user = queries::get_user(conn, user_id)?.ok_or(EngineError::UserNotFound(user_id))?;

    if let Some(run) = queries::get_progression_run(conn, user_id, start, end)? {
        return Ok(ProgressionResult::from_run(user_id, start, end, run));
    }

    let window = format!("{} to {}", fmt_day(start), fmt_day(end));
    if queries::closed_event_count(conn, start, end)? == 0 {
        return Ok(ProgressionResult::no_op(&user, start, end, format!("no closed events {window}")));
    }

    let fights = queries::eligible_window_fights(conn, start, end)?;
    if fights.is_empty() {
        return Ok(ProgressionResult::no_op(
            &user,
            start,
            end,
            format!("no eligible fights {window}, all cancelled"),
        ));
    }

    let picks = queries::active_window_picks(conn, user_id, start, end)?;
    let picked_fights: HashSet<_> = picks.iter().map(|p| p.fight_id).collect();
    let participation = participation_pct(picked_fights.len(), fights.len());

    let fights_by_id: HashMap<_, _> = fights.iter().map(|f| (f.id, f)).collect();
    let mut settled = Vec::with_capacity(picks.len());
    for pick in &picks {
        let Some(result) = queries::get_fight_result(conn, pick.fight_id)? else {
            continue;
        };
        let odds = fights_by_id
            .get(&pick.fight_id)
            .and_then(|f| f.odds_for(pick.predicted_winner_id))
            .map(String::from);
        settled.push(SettledPick {
            picked: pick.predicted_winner_id,
            units: pick.units,
            outcome: result.outcome,
            odds,
        });
    }
    let roi = compute_roi(&settled);

    let current = Standing {
        stars: user.stars,
        badge: user.badge,
    };
    let advanced = advance(config, current, participation, roi.roi, logins);

    let run = ProgressionRun {
        participation_pct: participation,
        roi: roi.roi,
        old_stars: current.stars,
        new_stars: advanced.standing.stars,
        old_badge: current.badge,
        new_badge: advanced.standing.badge,
        reason: format!(
            "{}: {} of {} fights picked, {:.2} units wagered, profit {:.2}",
            advanced.reason,
            picked_fights.len(),
            fights.len(),
            roi.total_units,
            roi.total_profit
        ),
    };
    queries::update_user_progression(conn, user_id, run.new_stars, run.new_badge, now)?;
    queries::insert_progression_run(conn, user_id, start, end, &run, now)?;

    Ok(ProgressionResult::from_run(user_id, start, end, run))
}
