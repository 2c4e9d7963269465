//! Error kinds surfaced by the settlement, progression and snapshot entry points.

use thiserror::Error;

use crate::types::{EventId, FightId, FighterId, UserId};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("fight {0} not found")]
    FightNotFound(FightId),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("event {0} not found")]
    EventNotFound(EventId),

    #[error("winner {winner} is not a participant in fight {fight}")]
    WinnerNotInFight { fight: FightId, winner: FighterId },

    #[error("invalid result: {0}")]
    InvalidResult(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl EngineError {
    /// Stable machine-readable code for collaborators.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::FightNotFound(_) => "FIGHT_NOT_FOUND",
            EngineError::UserNotFound(_) => "USER_NOT_FOUND",
            EngineError::EventNotFound(_) => "EVENT_NOT_FOUND",
            EngineError::WinnerNotInFight { .. } | EngineError::InvalidResult(_) => "INVALID_RESULT",
            EngineError::Database(_) | EngineError::Serialization(_) | EngineError::Corrupt(_) => {
                "TRANSACTION_FAILED"
            }
        }
    }

    /// True for errors a handler should map to a not-found response.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::FightNotFound(_) | EngineError::UserNotFound(_) | EngineError::EventNotFound(_)
        )
    }
}
