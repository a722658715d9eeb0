//! Violations and Audit Reports
//!
//! Closed violation taxonomy with an exhaustive severity mapping, so a
//! new detection cannot ship without the ban policy deciding how much
//! it matters.

use serde::{Deserialize, Serialize};

use crate::TimestampMs;

/// The kinds of violation the engine can record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Client build/asset checksum mismatch.
    ClientIntegrity,
    /// Movement faster than physics allows.
    SpeedHack,
    /// Action repeated below its cooldown.
    ImpossibleAction,
    /// Automated play patterns.
    Botting,
    /// Statistically implausible aim.
    AimAssist,
    /// Missed liveness heartbeat.
    NoHeartbeat,
}

impl ViolationKind {
    /// Fixed severity ranking driving the auto-ban policy.
    pub fn severity(self) -> Severity {
        match self {
            ViolationKind::ClientIntegrity => Severity::Critical,
            ViolationKind::SpeedHack => Severity::High,
            ViolationKind::Botting => Severity::High,
            ViolationKind::AimAssist => Severity::High,
            ViolationKind::ImpossibleAction => Severity::Medium,
            ViolationKind::NoHeartbeat => Severity::Low,
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ViolationKind::ClientIntegrity => "CLIENT_INTEGRITY",
            ViolationKind::SpeedHack => "SPEED_HACK",
            ViolationKind::ImpossibleAction => "IMPOSSIBLE_ACTION",
            ViolationKind::Botting => "BOTTING",
            ViolationKind::AimAssist => "AIM_ASSIST",
            ViolationKind::NoHeartbeat => "NO_HEARTBEAT",
        };
        f.write_str(name)
    }
}

/// Severity levels, ordered least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Advisory only.
    Low,
    /// Worth attention across a session.
    Medium,
    /// Strong cheat signal.
    High,
    /// Immediate auto-ban.
    Critical,
}

/// Per-kind evidence captured with a violation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ViolationDetails {
    /// Checksum pair that failed to match.
    ClientIntegrity {
        /// Checksum the client reported.
        provided: String,
        /// Checksum the server expected.
        expected: String,
    },
    /// Measured speed versus the limit.
    SpeedHack {
        /// Measured speed (units/second).
        speed: f64,
        /// Configured maximum speed.
        max_speed: f64,
        /// Distance covered between the two samples.
        distance: f64,
        /// Elapsed time between the samples, in seconds.
        elapsed_secs: f64,
    },
    /// Cooldown that was not respected.
    ImpossibleAction {
        /// Action type.
        action: String,
        /// Observed gap since the previous same-type action.
        gap_ms: u64,
        /// Required minimum cooldown.
        min_cooldown_ms: u64,
    },
    /// Botting suspicion breakdown.
    Botting {
        /// Total suspicion score.
        suspicion_score: u32,
        /// Inter-action timing standard deviation (ms).
        timing_std_dev_ms: f64,
        /// Whether a repeated action subsequence was found.
        repetitive_pattern: bool,
        /// Action success rate over the analyzed window.
        success_rate: f64,
    },
    /// Aim suspicion breakdown.
    AimAssist {
        /// Total suspicion score.
        suspicion_score: u32,
        /// Reported headshot percentage.
        headshot_percentage: f64,
        /// Reported hit rate percentage.
        hit_rate: f64,
        /// Wall-tracking suspicion metric in [0, 1].
        wall_tracking_score: f64,
    },
    /// Heartbeat gap beyond the allowed interval.
    NoHeartbeat {
        /// Observed gap since the last heartbeat.
        gap_ms: u64,
        /// Allowed maximum interval.
        max_interval_ms: u64,
    },
}

impl ViolationDetails {
    /// The violation kind this evidence belongs to.
    pub fn kind(&self) -> ViolationKind {
        match self {
            ViolationDetails::ClientIntegrity { .. } => ViolationKind::ClientIntegrity,
            ViolationDetails::SpeedHack { .. } => ViolationKind::SpeedHack,
            ViolationDetails::ImpossibleAction { .. } => ViolationKind::ImpossibleAction,
            ViolationDetails::Botting { .. } => ViolationKind::Botting,
            ViolationDetails::AimAssist { .. } => ViolationKind::AimAssist,
            ViolationDetails::NoHeartbeat { .. } => ViolationKind::NoHeartbeat,
        }
    }
}

/// A recorded violation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Session the violation occurred in.
    pub session_id: String,
    /// Offending player address.
    pub address: String,
    /// Violation kind.
    pub kind: ViolationKind,
    /// Severity, derived from the kind.
    pub severity: Severity,
    /// Evidence.
    pub details: ViolationDetails,
    /// When the violation was recorded.
    pub timestamp_ms: TimestampMs,
}

/// A standing ban decided by the engine. Enforcement (disconnects,
/// admission refusal) is the caller's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Banned address.
    pub address: String,
    /// Human-readable reason.
    pub reason: String,
    /// When the ban was decided.
    pub timestamp_ms: TimestampMs,
    /// Lifetime violation count at ban time.
    pub violation_count: usize,
}

/// Per-player summary in a session report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerReport {
    /// Player address.
    pub address: String,
    /// Violations recorded this session.
    pub violation_count: u32,
    /// Whether the session marked the player suspicious.
    pub suspicious: bool,
    /// Integrity checks performed.
    pub checksum_verifications: usize,
    /// Actions currently tracked (rolling window).
    pub actions_tracked: usize,
    /// Movement samples tracked.
    pub movements_tracked: usize,
}

/// Session audit document for the external persistence layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session identifier.
    pub session_id: String,
    /// Session duration at report time.
    pub duration_ms: u64,
    /// Total checks performed.
    pub checks_performed: u64,
    /// Every violation recorded in the session.
    pub violations: Vec<Violation>,
    /// Per-player summaries.
    pub players: Vec<PlayerReport>,
}

impl SessionReport {
    /// Compact binary encoding for archival.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("report serialization cannot fail")
    }

    /// Decode an archived report.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
