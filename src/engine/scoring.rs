//! Points awarded for a pick once its fight has a final result.
//!
//! Winner +1, method +2, round +3 (round only when the method also hit;
//! decisions get the round bonus automatically). Possible totals: 0, 1, 3, 6.

use crate::types::{FightResult, MethodCategory, Outcome, Pick};

pub const WINNER_POINTS: u32 = 1;
pub const METHOD_POINTS: u32 = 2;
pub const ROUND_POINTS: u32 = 3;

pub fn calculate_points(pick: &Pick, result: &FightResult) -> u32 {
    let winner = match result.outcome {
        Outcome::Decisive(winner) => winner,
        Outcome::Draw | Outcome::NoContest => return 0,
    };
    if pick.predicted_winner_id != winner {
        return 0;
    }

    let mut points = WINNER_POINTS;

    let predicted = MethodCategory::normalize(&pick.predicted_method);
    let actual = MethodCategory::normalize(&result.method);
    if predicted != actual {
        return points;
    }
    points += METHOD_POINTS;

    if actual.is_decision() || pick.predicted_round == Some(result.round) {
        points += ROUND_POINTS;
    }
    points
}
