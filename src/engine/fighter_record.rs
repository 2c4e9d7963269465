use serde::Serialize;

use crate::types::{FighterId, MethodCategory};

/// Career aggregate for one fighter. Only settlement mutates it, one
/// explicit method per outcome type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FighterRecord {
    pub fighter_id: FighterId,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub no_contests: u32,
    pub ko_tko_wins: u32,
    pub submission_wins: u32,
    pub decision_wins: u32,
    pub ko_tko_losses: u32,
    pub submission_losses: u32,
    pub decision_losses: u32,
    pub win_streak: u32,
    pub loss_streak: u32,
    pub longest_win_streak: u32,
}

impl FighterRecord {
    pub fn new(fighter_id: FighterId) -> Self {
        Self {
            fighter_id,
            ..Default::default()
        }
    }

    pub fn record_win(&mut self, method: &MethodCategory) {
        self.wins += 1;
        match method {
            MethodCategory::KoTko => self.ko_tko_wins += 1,
            MethodCategory::Submission => self.submission_wins += 1,
            MethodCategory::Decision => self.decision_wins += 1,
            MethodCategory::Other(_) => {}
        }
        self.win_streak += 1;
        self.loss_streak = 0;
        self.longest_win_streak = self.longest_win_streak.max(self.win_streak);
    }

    pub fn record_loss(&mut self, method: &MethodCategory) {
        self.losses += 1;
        match method {
            MethodCategory::KoTko => self.ko_tko_losses += 1,
            MethodCategory::Submission => self.submission_losses += 1,
            MethodCategory::Decision => self.decision_losses += 1,
            MethodCategory::Other(_) => {}
        }
        self.loss_streak += 1;
        self.win_streak = 0;
    }

    /// Streaks are left untouched by draws.
    pub fn record_draw(&mut self) {
        self.draws += 1;
    }

    pub fn record_no_contest(&mut self) {
        self.no_contests += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_updates_breakdown_and_streak() {
        let mut rec = FighterRecord::new(1);
        rec.record_win(&MethodCategory::KoTko);
        rec.record_win(&MethodCategory::Decision);
        assert_eq!(rec.wins, 2);
        assert_eq!(rec.ko_tko_wins, 1);
        assert_eq!(rec.decision_wins, 1);
        assert_eq!(rec.win_streak, 2);
        assert_eq!(rec.longest_win_streak, 2);
    }

    #[test]
    fn test_loss_resets_win_streak_keeps_high_water_mark() {
        let mut rec = FighterRecord::new(1);
        for _ in 0..3 {
            rec.record_win(&MethodCategory::Submission);
        }
        rec.record_loss(&MethodCategory::Submission);
        assert_eq!(rec.win_streak, 0);
        assert_eq!(rec.loss_streak, 1);
        assert_eq!(rec.longest_win_streak, 3);
        assert_eq!(rec.submission_losses, 1);

        rec.record_win(&MethodCategory::Other("dq".into()));
        assert_eq!(rec.loss_streak, 0);
        assert_eq!(rec.win_streak, 1);
        assert_eq!(rec.longest_win_streak, 3);
        assert_eq!(rec.wins, 4);
    }

    #[test]
    fn test_draw_and_no_contest_leave_streaks() {
        let mut rec = FighterRecord::new(1);
        rec.record_win(&MethodCategory::KoTko);
        rec.record_draw();
        rec.record_no_contest();
        assert_eq!(rec.draws, 1);
        assert_eq!(rec.no_contests, 1);
        assert_eq!(rec.win_streak, 1);
    }
}
