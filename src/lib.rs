//! # Playfair Engine
//!
//! Session integrity and fairness engine for server-authoritative games.
//! Generates verifiable randomness, tracks and validates session state,
//! detects anomalous player behavior, pairs players, and records replays.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PLAYFAIR ENGINE                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Shared primitives                        │
//! │  ├── hash.rs      - Domain-separated SHA-256, hex digests    │
//! │  └── value.rs     - Schema-agnostic state tree + merge/diff  │
//! │                                                              │
//! │  fairness/        - Commit-reveal RNG                        │
//! │  ├── rng.rs       - Seeds, HMAC draws, verification          │
//! │  └── derived.rs   - Shuffles, weighted picks, coordinates    │
//! │                                                              │
//! │  sync/            - Versioned state synchronization          │
//! │  anticheat/       - Telemetry analysis and ban policy        │
//! │  matchmaker/      - ELO queues and match formation           │
//! │  replay/          - Event recording and playback             │
//! │                                                              │
//! │  registry.rs      - SessionRegistry orchestration facade     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority Model
//!
//! Every engine is an in-memory, single-writer-per-session authority.
//! The host game loop owns the clock: time-sensitive operations take an
//! explicit `now_ms` argument, so behavior is reproducible in tests and
//! across replays. No engine reads system time, performs I/O, or
//! schedules background work; the host invokes `cleanup` sweeps.
//!
//! The engine decides - it never enforces. Detection results are returned
//! as structured outcomes for the caller's policy layer; the one
//! autonomous decision is the anti-cheat auto-ban (critical violation or
//! more than ten lifetime violations).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod anticheat;
pub mod core;
pub mod fairness;
pub mod matchmaker;
pub mod registry;
pub mod replay;
pub mod sync;

// Re-export commonly used types
pub use crate::core::value::{StateValue, ValueDiff};
pub use crate::fairness::rng::{RngSession, Roll};
pub use anticheat::engine::AntiCheatEngine;
pub use matchmaker::engine::Matchmaker;
pub use registry::SessionRegistry;
pub use replay::recorder::ReplayRecorder;
pub use sync::engine::StateSynchronizer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Timestamp in milliseconds since the Unix epoch, supplied by the host.
pub type TimestampMs = u64;

/// Default maximum age for session-scoped data before cleanup (1 hour).
pub const DEFAULT_MAX_SESSION_AGE_MS: u64 = 3_600_000;
