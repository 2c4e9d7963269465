//! Settlement and progression engine for a combat-sports pick'em platform.
//!
//! Entry points:
//! - [`settlement::finalize_fight_result`] scores a finished fight.
//! - [`progression::ProgressionEngine`] applies monthly star/badge rules.
//! - [`snapshot::SnapshotBuilder`] records ranked leaderboard snapshots.

pub mod config;
pub mod engine;
pub mod error;
pub mod progression;
pub mod settlement;
pub mod snapshot;
pub mod store;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use store::Store;
