pub mod fighter_record;
pub mod leaderboard;
pub mod odds;
pub mod progression;
pub mod scoring;

pub use fighter_record::FighterRecord;
pub use scoring::calculate_points;

/// Round to 2 decimal places (ROI, competitive scores).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
