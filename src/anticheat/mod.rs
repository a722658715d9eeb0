//! Anti-Cheat Engine
//!
//! Per-session telemetry analysis: client integrity, movement speed,
//! action cooldowns, botting patterns, aim statistics and liveness.
//! Detections are structured outcomes for the caller's policy layer;
//! the engine's one autonomous decision is the auto-ban.

pub mod engine;
pub mod violation;

pub use engine::{
    AntiCheatEngine, AntiCheatError, AimAssistOutcome, BottingOutcome, CombatStats,
    CooldownOutcome, HeartbeatOutcome, IntegrityOutcome, MovementSample, SpeedOutcome,
};
pub use violation::{
    BanRecord, PlayerReport, SessionReport, Severity, Violation, ViolationDetails, ViolationKind,
};
