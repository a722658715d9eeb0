//! ELO Matchmaking
//!
//! Rating records, queue management and match formation. Runs before a
//! session exists; ratings are address-scoped and persist across
//! sessions within the engine's lifetime.

pub mod engine;
pub mod rating;

pub use engine::{
    MatchOutcome, MatchRecord, MatchShape, MatchSummary, Matchmaker, MatchmakerError,
    MatchPreferences, PlayerProfile, QueueEntry, QueueReceipt, QueueStatus, Team,
};
pub use rating::{
    elo_change, rank_division, Division, GameOutcome, PlayerStats, RankDivision, DEFAULT_K_FACTOR,
    DEFAULT_RATING,
};
