use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;

pub type UserId = i64;
pub type FighterId = i64;
pub type FightId = i64;
pub type EventId = i64;

/// How a fight ended. Replaces the sentinel strings `"draw"` / `"no_contest"`
/// that used to share a column with real winner ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "winner", rename_all = "snake_case")]
pub enum Outcome {
    Decisive(FighterId),
    Draw,
    NoContest,
}

impl Outcome {
    /// Parse the admin-facing winner field: a fighter id, `"draw"`,
    /// or `"no_contest"`. A missing or blank winner is a no contest.
    pub fn from_winner(winner: Option<&str>) -> Result<Self, EngineError> {
        let raw = match winner.map(str::trim) {
            None | Some("") => return Ok(Outcome::NoContest),
            Some(w) => w,
        };
        match raw.to_ascii_lowercase().as_str() {
            "draw" => Ok(Outcome::Draw),
            "no_contest" | "nc" | "no contest" => Ok(Outcome::NoContest),
            _ => raw
                .parse::<FighterId>()
                .map(Outcome::Decisive)
                .map_err(|_| EngineError::InvalidResult(format!("unrecognised winner {raw:?}"))),
        }
    }

    /// Rebuild from the stored `(outcome, winner_id)` column pair.
    pub fn from_columns(kind: &str, winner: Option<FighterId>) -> Option<Self> {
        match (kind, winner) {
            ("decisive", Some(id)) => Some(Outcome::Decisive(id)),
            ("draw", _) => Some(Outcome::Draw),
            ("no_contest", _) => Some(Outcome::NoContest),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Decisive(_) => "decisive",
            Outcome::Draw => "draw",
            Outcome::NoContest => "no_contest",
        }
    }

    pub fn winner(&self) -> Option<FighterId> {
        match self {
            Outcome::Decisive(id) => Some(*id),
            _ => None,
        }
    }

    /// Result label from one participant's point of view.
    pub fn label_for(&self, fighter: FighterId) -> ResultLabel {
        match self {
            Outcome::Decisive(winner) if *winner == fighter => ResultLabel::Win,
            Outcome::Decisive(_) => ResultLabel::Loss,
            Outcome::Draw => ResultLabel::Draw,
            Outcome::NoContest => ResultLabel::NoContest,
        }
    }
}

/// Per-fighter result written to the fight row and history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultLabel {
    #[serde(rename = "WIN")]
    Win,
    #[serde(rename = "LOSS")]
    Loss,
    #[serde(rename = "DRAW")]
    Draw,
    #[serde(rename = "NC")]
    NoContest,
}

impl ResultLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultLabel::Win => "WIN",
            ResultLabel::Loss => "LOSS",
            ResultLabel::Draw => "DRAW",
            ResultLabel::NoContest => "NC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WIN" => Some(ResultLabel::Win),
            "LOSS" => Some(ResultLabel::Loss),
            "DRAW" => Some(ResultLabel::Draw),
            "NC" => Some(ResultLabel::NoContest),
            _ => None,
        }
    }
}

/// Finish method bucket used for scoring and fighter breakdowns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodCategory {
    KoTko,
    Submission,
    Decision,
    Other(String),
}

impl MethodCategory {
    /// Substring-based normalisation of free-form method text.
    /// "KO/TKO (punches)" -> KoTko, "Sub (RNC)" -> Submission,
    /// "Split Decision" -> Decision, anything else stays raw (lowercased).
    pub fn normalize(raw: &str) -> Self {
        let m = raw.trim().to_ascii_lowercase();
        if m.contains("tko") || m.contains("ko") {
            MethodCategory::KoTko
        } else if m.contains("sub") {
            MethodCategory::Submission
        } else if ["dec", "unanimous", "split", "majority"]
            .iter()
            .any(|k| m.contains(k))
        {
            MethodCategory::Decision
        } else {
            MethodCategory::Other(m)
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self, MethodCategory::Decision)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Upcoming,
    Live,
    Completed,
    Closed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "Upcoming",
            EventStatus::Live => "Live",
            EventStatus::Completed => "Completed",
            EventStatus::Closed => "Closed",
            EventStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Upcoming" => Some(EventStatus::Upcoming),
            "Live" => Some(EventStatus::Live),
            "Completed" => Some(EventStatus::Completed),
            "Closed" => Some(EventStatus::Closed),
            "Cancelled" => Some(EventStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FightStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl FightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FightStatus::Scheduled => "Scheduled",
            FightStatus::Completed => "Completed",
            FightStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Scheduled" => Some(FightStatus::Scheduled),
            "Completed" => Some(FightStatus::Completed),
            "Cancelled" => Some(FightStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickStatus {
    Active,
    Voided,
}

impl PickStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickStatus::Active => "active",
            PickStatus::Voided => "voided",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PickStatus::Active),
            "voided" => Some(PickStatus::Voided),
            _ => None,
        }
    }
}

/// Post-max-star progression ladder. Ordering follows the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    None,
    Ninja,
    Samurai,
    Master,
    Goat,
}

impl BadgeTier {
    /// One step up, capped at `Goat`.
    pub fn promote(self) -> Self {
        match self {
            BadgeTier::None => BadgeTier::Ninja,
            BadgeTier::Ninja => BadgeTier::Samurai,
            BadgeTier::Samurai => BadgeTier::Master,
            BadgeTier::Master | BadgeTier::Goat => BadgeTier::Goat,
        }
    }

    /// One step down. Once earned, a badge never falls below `Ninja`.
    pub fn demote(self) -> Self {
        match self {
            BadgeTier::Goat => BadgeTier::Master,
            BadgeTier::Master => BadgeTier::Samurai,
            BadgeTier::Samurai | BadgeTier::Ninja => BadgeTier::Ninja,
            BadgeTier::None => BadgeTier::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeTier::None => "none",
            BadgeTier::Ninja => "ninja",
            BadgeTier::Samurai => "samurai",
            BadgeTier::Master => "master",
            BadgeTier::Goat => "goat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(BadgeTier::None),
            "ninja" => Some(BadgeTier::Ninja),
            "samurai" => Some(BadgeTier::Samurai),
            "master" => Some(BadgeTier::Master),
            "goat" => Some(BadgeTier::Goat),
            _ => None,
        }
    }
}

impl fmt::Display for BadgeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotType {
    Event,
    Monthly,
    Weekly,
}

impl SnapshotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotType::Event => "event",
            SnapshotType::Monthly => "monthly",
            SnapshotType::Weekly => "weekly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "event" => Some(SnapshotType::Event),
            "monthly" => Some(SnapshotType::Monthly),
            "weekly" => Some(SnapshotType::Weekly),
            _ => None,
        }
    }
}

// ── Records ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    /// Unix seconds.
    pub event_date: i64,
    pub status: EventStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct Fighter {
    pub id: FighterId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Fight {
    pub id: FightId,
    pub event_id: EventId,
    pub fighter1_id: FighterId,
    pub fighter2_id: FighterId,
    pub scheduled_rounds: u32,
    pub status: FightStatus,
    pub fighter1_odds: Option<String>, // American odds
    pub fighter2_odds: Option<String>, // American odds
}

impl Fight {
    pub fn has_participant(&self, fighter: FighterId) -> bool {
        self.fighter1_id == fighter || self.fighter2_id == fighter
    }

    /// Posted odds for the given side, if that fighter is in this bout.
    pub fn odds_for(&self, fighter: FighterId) -> Option<&str> {
        if fighter == self.fighter1_id {
            self.fighter1_odds.as_deref()
        } else if fighter == self.fighter2_id {
            self.fighter2_odds.as_deref()
        } else {
            None
        }
    }
}

/// Admin-entered result for one fight.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultPayload {
    /// Fighter id, `"draw"` or `"no_contest"`.
    #[serde(default)]
    pub winner: Option<String>,
    pub method: String,
    pub round: u32,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub referee: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FightResult {
    pub id: i64,
    pub fight_id: FightId,
    pub outcome: Outcome,
    pub method: String,
    pub round: u32,
    pub time: String,
    pub referee: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pick {
    pub id: i64,
    pub user_id: UserId,
    pub fight_id: FightId,
    pub predicted_winner_id: FighterId,
    pub predicted_method: String,
    pub predicted_round: Option<u32>,
    pub units: f64,
    pub status: PickStatus,
    pub is_locked: bool,
    pub points_awarded: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub total_points: i64,
    pub stars: f64,
    pub badge: BadgeTier,
    pub last_progression_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FightHistoryEntry {
    /// `<fight>_<fighter>`
    pub id: String,
    pub fight_id: FightId,
    pub fighter_id: FighterId,
    pub fighter_name: String,
    pub opponent_id: FighterId,
    pub opponent_name: String,
    pub event_id: EventId,
    pub event_name: String,
    pub event_date: i64,
    pub result: ResultLabel,
    pub method: String,
    pub round: u32,
    pub time: String,
    pub created_at: i64,
}

impl FightHistoryEntry {
    pub fn key(fight: FightId, fighter: FighterId) -> String {
        format!("{fight}_{fighter}")
    }
}
