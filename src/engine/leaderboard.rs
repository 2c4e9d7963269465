//! Composite competitive score and ranking for leaderboard snapshots.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use super::round2;
use crate::config::LeaderboardConfig;
use crate::types::{EventId, UserId};

/// A scored pick reduced to what ranking needs.
#[derive(Debug, Clone, Copy)]
pub struct ScoredPick {
    pub event_id: EventId,
    pub points_awarded: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    pub total_picks: u32,
    pub correct_picks: u32,
    pub accuracy: f64,
    pub recent_picks: u32,
    pub recent_correct: u32,
    pub recent_accuracy: f64,
    pub participation: f64,
    pub total_points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_points: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub user_id: UserId,
    pub competitive_score: f64,
    pub metrics: UserMetrics,
    pub rank: u32,
}

fn ratio(n: u32, d: u32) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

/// Lifetime accuracy, recent-form accuracy (picks on `recent_events`) and
/// participation against `total_fights` settled bouts. Ratios are 0-1.
pub fn user_metrics(
    picks: &[ScoredPick],
    total_fights: u32,
    recent_events: &HashSet<EventId>,
    total_points: i64,
    scope_event: Option<EventId>,
) -> UserMetrics {
    let total_picks = picks.len() as u32;
    let correct_picks = picks.iter().filter(|p| p.points_awarded > 0).count() as u32;

    let recent: Vec<&ScoredPick> = picks
        .iter()
        .filter(|p| recent_events.contains(&p.event_id))
        .collect();
    let recent_picks = recent.len() as u32;
    let recent_correct = recent.iter().filter(|p| p.points_awarded > 0).count() as u32;

    let event_points = scope_event.map(|event| {
        picks
            .iter()
            .filter(|p| p.event_id == event)
            .map(|p| p.points_awarded as i64)
            .sum()
    });

    UserMetrics {
        total_picks,
        correct_picks,
        accuracy: ratio(correct_picks, total_picks),
        recent_picks,
        recent_correct,
        recent_accuracy: ratio(recent_correct, recent_picks),
        participation: ratio(total_picks, total_fights).min(1.0),
        total_points,
        event_points,
    }
}

/// Weighted blend of the three 0-1 ratios, on a 0-100 scale, 2 decimals.
pub fn composite_score(cfg: &LeaderboardConfig, metrics: &UserMetrics) -> f64 {
    let blended = cfg.accuracy_weight * metrics.accuracy
        + cfg.recent_accuracy_weight * metrics.recent_accuracy
        + cfg.participation_weight * metrics.participation;
    round2(100.0 * blended)
}

/// Sort by score desc, then total points desc, then user id asc, and assign
/// ranks 1..N without gaps.
pub fn rank(mut scored: Vec<(UserId, f64, UserMetrics)>) -> Vec<RankedEntry> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.2.total_points.cmp(&a.2.total_points))
            .then_with(|| a.0.cmp(&b.0))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (user_id, competitive_score, metrics))| RankedEntry {
            user_id,
            competitive_score,
            metrics,
            rank: i as u32 + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn metrics(accuracy: f64, recent_accuracy: f64, participation: f64, total_points: i64) -> UserMetrics {
        UserMetrics {
            total_picks: 0,
            correct_picks: 0,
            accuracy,
            recent_picks: 0,
            recent_correct: 0,
            recent_accuracy,
            participation,
            total_points,
            event_points: None,
        }
    }

    fn pick(event_id: EventId, points_awarded: u32) -> ScoredPick {
        ScoredPick {
            event_id,
            points_awarded,
        }
    }

    #[test]
    fn test_user_metrics() {
        let picks = [pick(1, 6), pick(1, 0), pick(2, 1), pick(3, 0)];
        let recent: HashSet<EventId> = [2, 3].into_iter().collect();
        let m = user_metrics(&picks, 8, &recent, 7, Some(1));
        assert_eq!(m.total_picks, 4);
        assert_eq!(m.correct_picks, 2);
        assert_eq!(m.accuracy, 0.5);
        assert_eq!(m.recent_picks, 2);
        assert_eq!(m.recent_correct, 1);
        assert_eq!(m.recent_accuracy, 0.5);
        assert_eq!(m.participation, 0.5);
        assert_eq!(m.event_points, Some(6));
    }

    #[test]
    fn test_user_metrics_no_picks() {
        let m = user_metrics(&[], 0, &HashSet::new(), 0, None);
        assert_eq!(m.accuracy, 0.0);
        assert_eq!(m.participation, 0.0);
        assert_eq!(m.event_points, None);
    }

    #[test]
    fn test_participation_clamped() {
        let picks = [pick(1, 1), pick(1, 1), pick(1, 1)];
        let m = user_metrics(&picks, 2, &HashSet::new(), 3, None);
        assert_eq!(m.participation, 1.0);
    }

    #[test]
    fn test_composite_score_weights() {
        let cfg = LeaderboardConfig::default();
        assert_eq!(composite_score(&cfg, &metrics(1.0, 1.0, 1.0, 0)), 100.0);
        assert_eq!(composite_score(&cfg, &metrics(0.5, 0.0, 0.0, 0)), 30.0);
        assert_eq!(composite_score(&cfg, &metrics(0.0, 0.5, 0.0, 0)), 12.5);
        assert_eq!(composite_score(&cfg, &metrics(0.0, 0.0, 1.0 / 3.0, 0)), 5.0);
    }

    #[test]
    fn test_composite_monotonic_in_each_input() {
        let cfg = LeaderboardConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let (a, r, p) = (rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>());
            let base = composite_score(&cfg, &metrics(a, r, p, 0));
            let bump = rng.gen::<f64>() * 0.5;
            assert!(composite_score(&cfg, &metrics((a + bump).min(1.0), r, p, 0)) >= base);
            assert!(composite_score(&cfg, &metrics(a, (r + bump).min(1.0), p, 0)) >= base);
            assert!(composite_score(&cfg, &metrics(a, r, (p + bump).min(1.0), 0)) >= base);
        }
    }

    #[test]
    fn test_rank_order_and_tie_break() {
        let ranked = rank(vec![
            (3, 40.0, metrics(0.0, 0.0, 0.0, 10)),
            (1, 55.5, metrics(0.0, 0.0, 0.0, 2)),
            (2, 40.0, metrics(0.0, 0.0, 0.0, 10)),
            (4, 40.0, metrics(0.0, 0.0, 0.0, 25)),
        ]);
        let order: Vec<UserId> = ranked.iter().map(|e| e.user_id).collect();
        assert_eq!(order, vec![1, 4, 2, 3]);
        let ranks: Vec<u32> = ranked.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(Vec::new()).is_empty());
    }
}
