//! Star / badge progression rules.
//!
//! Pure functions: the progression service gathers a user's picks for a
//! window and hands them here to compute participation, ROI and the new
//! standing.

use serde::Serialize;

use super::odds::settled_profit;
use super::round2;
use crate::config::ProgressionConfig;
use crate::types::{BadgeTier, FighterId, Outcome};

/// One active pick on a settled fight, with the odds posted for its side.
#[derive(Debug, Clone)]
pub struct SettledPick {
    pub picked: FighterId,
    pub units: f64,
    pub outcome: Outcome,
    pub odds: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoiSummary {
    pub total_units: f64,
    pub total_profit: f64,
    /// Percent, rounded to 2 decimals. 0 when nothing was wagered.
    pub roi: f64,
}

/// Profit/loss across settled picks. Draws and no contests refund the stake:
/// zero profit but the units still count as wagered.
pub fn compute_roi(picks: &[SettledPick]) -> RoiSummary {
    let mut total_units = 0.0;
    let mut total_profit = 0.0;

    for pick in picks {
        total_units += pick.units;
        match pick.outcome {
            Outcome::Decisive(winner) if winner == pick.picked => {
                total_profit += settled_profit(pick.odds.as_deref(), pick.units);
            }
            Outcome::Decisive(_) => total_profit -= pick.units,
            Outcome::Draw | Outcome::NoContest => {}
        }
    }

    let roi = if total_units > 0.0 {
        round2(100.0 * total_profit / total_units)
    } else {
        0.0
    };
    RoiSummary {
        total_units,
        total_profit,
        roi,
    }
}

/// Whole-percent share of eligible fights the user picked.
pub fn participation_pct(picked: usize, eligible_fights: usize) -> u32 {
    if eligible_fights == 0 {
        return 0;
    }
    (100.0 * picked as f64 / eligible_fights as f64).round() as u32
}

/// Fractional star bonus for logging in, capped at `login_bonus_cap`.
pub fn login_bonus(cfg: &ProgressionConfig, logins: u32) -> f64 {
    if cfg.logins_for_full_bonus == 0 {
        return 0.0;
    }
    let per_login = cfg.login_bonus_cap / cfg.logins_for_full_bonus as f64;
    (logins as f64 * per_login).min(cfg.login_bonus_cap)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Standing {
    pub stars: f64,
    pub badge: BadgeTier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Advancement {
    pub standing: Standing,
    pub reason: String,
}

/// Apply the rule table, then the login bonus.
pub fn advance(
    cfg: &ProgressionConfig,
    current: Standing,
    participation: u32,
    roi: f64,
    logins: u32,
) -> Advancement {
    let at_max = current.stars >= cfg.max_stars;
    let mut next = current;

    if roi == 0.0 {
        return Advancement {
            standing: current,
            reason: format!("neutral: ROI 0.00% with {participation}% participation, no change"),
        };
    }

    let mut reason = if roi > 0.0 && participation >= cfg.participation_threshold_pct {
        if at_max {
            next.badge = current.badge.promote();
            format!(
                "advance: ROI {roi:.2}% with {participation}% participation at max stars, badge {} -> {}",
                current.badge, next.badge
            )
        } else {
            let gain = if roi > cfg.strong_roi_pct { 2.0 } else { 1.0 };
            next.stars = (current.stars + gain).min(cfg.max_stars);
            format!(
                "advance: ROI {roi:.2}% with {participation}% participation, +{gain} star(s) {} -> {}",
                fmt_stars(current.stars),
                fmt_stars(next.stars)
            )
        }
    } else if roi > 0.0 {
        format!(
            "hold: ROI {roi:.2}% but participation {participation}% is below {}%",
            cfg.participation_threshold_pct
        )
    } else if !at_max || current.badge <= BadgeTier::Ninja {
        next.stars = (current.stars - 1.0).max(0.0);
        format!(
            "regress: ROI {roi:.2}% with {participation}% participation, -1 star {} -> {}",
            fmt_stars(current.stars),
            fmt_stars(next.stars)
        )
    } else {
        next.badge = current.badge.demote();
        format!(
            "regress: ROI {roi:.2}% with {participation}% participation at max stars, badge {} -> {}",
            current.badge, next.badge
        )
    };

    let bonus = login_bonus(cfg, logins);
    if bonus > 0.0 && !at_max && next.stars < cfg.max_stars {
        let before = next.stars;
        next.stars = (next.stars + bonus).min(cfg.max_stars);
        reason.push_str(&format!(
            "; login bonus +{:.3} ({logins} logins) {} -> {}",
            next.stars - before,
            fmt_stars(before),
            fmt_stars(next.stars)
        ));
    }

    Advancement {
        standing: next,
        reason,
    }
}

fn fmt_stars(stars: f64) -> String {
    let s = format!("{stars:.3}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ProgressionConfig {
        ProgressionConfig::default()
    }

    fn standing(stars: f64, badge: BadgeTier) -> Standing {
        Standing { stars, badge }
    }

    fn settled(picked: i64, units: f64, outcome: Outcome, odds: Option<&str>) -> SettledPick {
        SettledPick {
            picked,
            units,
            outcome,
            odds: odds.map(String::from),
        }
    }

    #[test]
    fn test_roi_favorite_win() {
        // 2 units at -150 wins 1.33; ROI = 100 * 1.333 / 2 = 66.67
        let summary = compute_roi(&[settled(1, 2.0, Outcome::Decisive(1), Some("-150"))]);
        assert_eq!(summary.total_units, 2.0);
        assert_eq!(round2(summary.total_profit), 1.33);
        assert_eq!(summary.roi, 66.67);
    }

    #[test]
    fn test_roi_even_money_without_odds() {
        let summary = compute_roi(&[
            settled(1, 1.0, Outcome::Decisive(1), None),
            settled(1, 1.0, Outcome::Decisive(2), None),
        ]);
        assert_eq!(summary.total_profit, 0.0);
        assert_eq!(summary.roi, 0.0);
    }

    #[test]
    fn test_roi_draw_refunds_but_counts_units() {
        let summary = compute_roi(&[
            settled(1, 3.0, Outcome::Draw, Some("+200")),
            settled(1, 1.0, Outcome::Decisive(2), Some("+200")),
        ]);
        assert_eq!(summary.total_units, 4.0);
        assert_eq!(summary.total_profit, -1.0);
        assert_eq!(summary.roi, -25.0);
    }

    #[test]
    fn test_roi_empty() {
        let summary = compute_roi(&[]);
        assert_eq!(summary.roi, 0.0);
        assert_eq!(summary.total_units, 0.0);
    }

    #[test]
    fn test_participation_pct() {
        assert_eq!(participation_pct(7, 10), 70);
        assert_eq!(participation_pct(2, 3), 67);
        assert_eq!(participation_pct(0, 0), 0);
    }

    #[test]
    fn test_login_bonus_capped() {
        assert_eq!(login_bonus(&cfg(), 0), 0.0);
        assert!((login_bonus(&cfg(), 4) - 0.125).abs() < 1e-9);
        assert_eq!(login_bonus(&cfg(), 8), 0.25);
        assert_eq!(login_bonus(&cfg(), 30), 0.25);
    }

    #[test]
    fn test_zero_roi_never_changes_standing() {
        for badge in [BadgeTier::None, BadgeTier::Samurai, BadgeTier::Goat] {
            let cur = standing(3.0, badge);
            let adv = advance(&cfg(), cur, 100, 0.0, 8);
            assert_eq!(adv.standing, cur);
            assert!(adv.reason.starts_with("neutral"));
        }
    }

    #[test]
    fn test_positive_roi_gains_one_star() {
        let adv = advance(&cfg(), standing(2.0, BadgeTier::None), 80, 10.0, 0);
        assert_eq!(adv.standing.stars, 3.0);
        assert!(adv.reason.contains("+1 star"), "{}", adv.reason);
    }

    #[test]
    fn test_strong_roi_gains_two_stars_capped() {
        let adv = advance(&cfg(), standing(2.0, BadgeTier::None), 70, 15.01, 0);
        assert_eq!(adv.standing.stars, 4.0);
        let adv = advance(&cfg(), standing(4.0, BadgeTier::None), 90, 40.0, 0);
        assert_eq!(adv.standing.stars, 5.0);
        assert_eq!(adv.standing.badge, BadgeTier::None);
    }

    #[test]
    fn test_roi_exactly_strong_threshold_is_single_star() {
        let adv = advance(&cfg(), standing(1.0, BadgeTier::None), 100, 15.0, 0);
        assert_eq!(adv.standing.stars, 2.0);
    }

    #[test]
    fn test_max_stars_advances_badge_not_stars() {
        let adv = advance(&cfg(), standing(5.0, BadgeTier::None), 75, 3.0, 8);
        assert_eq!(adv.standing.stars, 5.0);
        assert_eq!(adv.standing.badge, BadgeTier::Ninja);

        let adv = advance(&cfg(), standing(5.0, BadgeTier::Goat), 75, 30.0, 0);
        assert_eq!(adv.standing.badge, BadgeTier::Goat);
    }

    #[test]
    fn test_low_participation_blocks_gain() {
        let adv = advance(&cfg(), standing(2.0, BadgeTier::None), 69, 50.0, 0);
        assert_eq!(adv.standing.stars, 2.0);
        assert!(adv.reason.starts_with("hold"));
    }

    #[test]
    fn test_negative_roi_loses_star_with_floor() {
        let adv = advance(&cfg(), standing(3.0, BadgeTier::None), 100, -5.0, 0);
        assert_eq!(adv.standing.stars, 2.0);
        let adv = advance(&cfg(), standing(0.5, BadgeTier::None), 10, -5.0, 0);
        assert_eq!(adv.standing.stars, 0.0);
    }

    #[test]
    fn test_negative_roi_at_max_with_low_badge_loses_star() {
        let adv = advance(&cfg(), standing(5.0, BadgeTier::Ninja), 100, -1.0, 0);
        assert_eq!(adv.standing.stars, 4.0);
        assert_eq!(adv.standing.badge, BadgeTier::Ninja);
    }

    #[test]
    fn test_negative_roi_regresses_badge_never_below_ninja() {
        let mut cur = standing(5.0, BadgeTier::Goat);
        for expected in [BadgeTier::Master, BadgeTier::Samurai, BadgeTier::Ninja] {
            cur = advance(&cfg(), cur, 100, -12.0, 0).standing;
            assert_eq!(cur.badge, expected);
            assert_eq!(cur.stars, 5.0);
        }
        // At ninja the user starts losing stars instead, badge is kept.
        cur = advance(&cfg(), cur, 100, -12.0, 0).standing;
        assert_eq!(cur.badge, BadgeTier::Ninja);
        assert_eq!(cur.stars, 4.0);
    }

    #[test]
    fn test_login_bonus_added_below_max() {
        let adv = advance(&cfg(), standing(2.0, BadgeTier::None), 80, 5.0, 8);
        assert_eq!(adv.standing.stars, 3.25);
        assert!(adv.reason.contains("login bonus"));

        let adv = advance(&cfg(), standing(4.9, BadgeTier::None), 10, 5.0, 8);
        assert_eq!(adv.standing.stars, 5.0);
    }

    #[test]
    fn test_login_bonus_not_applied_at_max() {
        let adv = advance(&cfg(), standing(4.0, BadgeTier::None), 80, 5.0, 8);
        assert_eq!(adv.standing.stars, 5.0);
        assert!(!adv.reason.contains("login bonus"));
    }

    #[test]
    fn test_login_bonus_needs_stars_below_max_before_the_run() {
        // Dropping off the cap this month does not reopen the bonus.
        let adv = advance(&cfg(), standing(5.0, BadgeTier::Ninja), 100, -8.0, 8);
        assert_eq!(adv.standing.stars, 4.0);
        assert_eq!(adv.standing.badge, BadgeTier::Ninja);
        assert!(!adv.reason.contains("login bonus"), "{}", adv.reason);
    }
}
