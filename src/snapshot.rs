//! Leaderboard snapshots: rank every user by composite competitive score
//! and store the ranking as one immutable row.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use uuid::Uuid;

use crate::config::LeaderboardConfig;
use crate::engine::leaderboard::{composite_score, rank, user_metrics, UserMetrics};
use crate::error::{EngineError, EngineResult};
use crate::store::{queries, Snapshot, Store};
use crate::types::{EventId, EventStatus, SnapshotType, UserId};

pub struct SnapshotBuilder<'a> {
    store: &'a Store,
    config: &'a LeaderboardConfig,
    max_concurrency: usize,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(store: &'a Store, config: &'a LeaderboardConfig, max_concurrency: usize) -> Self {
        Self {
            store,
            config,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn create_leaderboard_snapshot(
        &self,
        snapshot_type: SnapshotType,
        event_id: Option<EventId>,
    ) -> EngineResult<Snapshot> {
        if let Some(event_id) = event_id {
            self.store
                .read(|conn| queries::get_event(conn, event_id))
                .await?
                .ok_or(EngineError::EventNotFound(event_id))?;
        }

        let (user_ids, completed_events, total_fights) = self
            .store
            .read(|conn| {
                Ok((
                    queries::all_user_ids(conn)?,
                    queries::completed_event_ids(conn)?,
                    queries::completed_fight_count(conn)?,
                ))
            })
            .await?;
        let recent: HashSet<EventId> = completed_events
            .iter()
            .take(self.config.recent_event_count as usize)
            .copied()
            .collect();
        let recent = &recent;

        let computed: Vec<(UserId, EngineResult<UserMetrics>)> = stream::iter(user_ids)
            .map(|user_id| async move {
                let metrics = self
                    .store
                    .read(|conn| {
                        let user = queries::get_user(conn, user_id)?.ok_or(EngineError::UserNotFound(user_id))?;
                        let picks = queries::scored_picks_for_user(conn, user_id)?;
                        Ok(user_metrics(&picks, total_fights, recent, user.total_points, event_id))
                    })
                    .await;
                (user_id, metrics)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut scored = Vec::with_capacity(computed.len());
        for (user_id, metrics) in computed {
            match metrics {
                Ok(m) => scored.push((user_id, composite_score(self.config, &m), m)),
                Err(e) => tracing::warn!(user_id, error = %e, "leaderboard metrics failed, user excluded"),
            }
        }

        let snapshot = Snapshot {
            id: Uuid::new_v4().to_string(),
            snapshot_type,
            event_id,
            created_at: Utc::now().timestamp(),
            rankings: rank(scored),
        };
        self.store
            .transaction(|tx| queries::insert_snapshot(tx, &snapshot))
            .await?;

        tracing::info!(
            snapshot_id = %snapshot.id,
            snapshot_type = snapshot_type.as_str(),
            event_id = ?event_id,
            entries = snapshot.rankings.len(),
            "leaderboard snapshot created"
        );
        Ok(snapshot)
    }

    /// Transition an event to `Closed` and record its event snapshot.
    pub async fn close_event(&self, event_id: EventId) -> EngineResult<Snapshot> {
        self.store
            .transaction(|tx| queries::set_event_status(tx, event_id, EventStatus::Closed))
            .await?;
        tracing::info!(event_id, "event closed");
        self.create_leaderboard_snapshot(SnapshotType::Event, Some(event_id)).await
    }
}
