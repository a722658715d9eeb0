//! Telemetry Analysis and Ban Policy
//!
//! The engine tracks per-player telemetry for every session it was
//! initialized for and turns it into structured detection outcomes.
//! Thresholds match the established tuning: a 50% speed tolerance, a
//! rolling 60-second action window, and fixed suspicion scores per
//! signal. Auto-ban policy is deliberately not configurable: one
//! critical violation, or more than ten lifetime violations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::anticheat::violation::{
    BanRecord, PlayerReport, SessionReport, Severity, Violation, ViolationDetails,
};
use crate::TimestampMs;

/// Speed tolerance multiplier before a movement flags.
pub const SPEED_TOLERANCE: f64 = 1.5;

/// Rolling window for tracked actions.
pub const ACTION_WINDOW_MS: u64 = 60_000;

/// Minimum logged actions before botting analysis runs.
pub const BOTTING_MIN_ACTIONS: usize = 50;

/// Default heartbeat interval ceiling.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// Lifetime violation count beyond which an address is auto-banned.
const AUTO_BAN_VIOLATION_LIMIT: usize = 10;

/// Errors signalling caller misuse of the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AntiCheatError {
    /// No tracking initialized for the session.
    #[error("session {0} not tracked")]
    SessionNotFound(String),

    /// Player is not part of the tracked session.
    #[error("player {address} not tracked in session {session_id}")]
    PlayerNotTracked {
        /// Session the call targeted.
        session_id: String,
        /// Unknown player address.
        address: String,
    },
}

/// A positional telemetry sample. Timestamps come from the client's
/// submission envelope, validated upstream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementSample {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Sample time.
    pub timestamp_ms: TimestampMs,
}

/// Combat statistics submitted for aim analysis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    /// Headshot percentage in [0, 100].
    pub headshot_percentage: f64,
    /// Hit rate percentage in [0, 100].
    pub hit_rate: f64,
    /// Wall-tracking suspicion metric in [0, 1].
    pub wall_tracking_score: f64,
}

/// Result of a client integrity check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegrityOutcome {
    /// True iff the reported checksum matched the expected one.
    pub valid: bool,
}

/// Result of a speed analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedOutcome {
    /// True when measured speed exceeded the tolerated maximum.
    pub detected: bool,
    /// Measured speed, when two samples were available.
    pub speed: Option<f64>,
    /// Maximum speed the check ran against.
    pub max_speed: f64,
}

/// Result of a cooldown check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CooldownOutcome {
    /// True when the same-type gap was below the cooldown.
    pub detected: bool,
    /// Gap since the previous same-type action, when one existed.
    pub gap_ms: Option<u64>,
    /// Cooldown the check ran against.
    pub min_cooldown_ms: u64,
}

/// Result of a botting analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BottingOutcome {
    /// True when the combined suspicion score crossed the threshold.
    pub detected: bool,
    /// Combined suspicion score, capped at 100.
    pub confidence: u32,
    /// Inter-action timing deviation was below 50 ms.
    pub low_timing_variance: bool,
    /// A repeated action subsequence was found.
    pub repetitive_pattern: bool,
    /// Success rate exceeded 95%.
    pub inhuman_consistency: bool,
}

/// Result of an aim analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AimAssistOutcome {
    /// True when the combined suspicion score crossed the threshold.
    pub detected: bool,
    /// Combined suspicion score, capped at 100.
    pub confidence: u32,
}

/// Result of a liveness probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatOutcome {
    /// True when the client responded within the allowed interval.
    pub alive: bool,
    /// Observed gap since the previous heartbeat.
    pub gap_ms: u64,
}

/// Retained as evidence for dispute review; only counted in reports.
#[derive(Clone, Debug)]
#[allow(dead_code)]
struct ChecksumCheck {
    timestamp_ms: TimestampMs,
    provided: String,
    expected: String,
    valid: bool,
}

#[derive(Clone, Debug)]
struct ActionSample {
    kind: String,
    timestamp_ms: TimestampMs,
    success: bool,
}

struct PlayerTracker {
    address: String,
    checksums: Vec<ChecksumCheck>,
    movements: Vec<MovementSample>,
    actions: Vec<ActionSample>,
    last_heartbeat_ms: TimestampMs,
    violation_count: u32,
    suspicious: bool,
}

struct SessionTracker {
    players: BTreeMap<String, PlayerTracker>,
    started_at_ms: TimestampMs,
    checks_performed: u64,
    violations: Vec<Violation>,
}

/// Per-session telemetry analyzer with address-scoped ban bookkeeping.
///
/// Session trackers are dropped by [`cleanup`](Self::cleanup); violation
/// histories and bans are address-scoped and persist for the engine's
/// lifetime.
#[derive(Default)]
pub struct AntiCheatEngine {
    sessions: BTreeMap<String, SessionTracker>,
    violations: BTreeMap<String, Vec<Violation>>,
    bans: BTreeMap<String, BanRecord>,
}

impl AntiCheatEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate tracking records for a session's players.
    pub fn init_session(&mut self, session_id: &str, players: &[String], now_ms: TimestampMs) {
        let players = players
            .iter()
            .map(|address| {
                (
                    address.clone(),
                    PlayerTracker {
                        address: address.clone(),
                        checksums: Vec::new(),
                        movements: Vec::new(),
                        actions: Vec::new(),
                        last_heartbeat_ms: now_ms,
                        violation_count: 0,
                        suspicious: false,
                    },
                )
            })
            .collect();

        debug!(session_id, "anti-cheat tracking initialized");
        self.sessions.insert(
            session_id.to_string(),
            SessionTracker {
                players,
                started_at_ms: now_ms,
                checks_performed: 0,
                violations: Vec::new(),
            },
        );
    }

    /// Exact-match verification of a client build/asset checksum.
    /// A mismatch is a critical violation (and therefore an auto-ban).
    pub fn verify_client_integrity(
        &mut self,
        session_id: &str,
        address: &str,
        client_checksum: &str,
        expected_checksum: &str,
        now_ms: TimestampMs,
    ) -> Result<IntegrityOutcome, AntiCheatError> {
        let player = self.player_mut(session_id, address)?;
        let valid = client_checksum == expected_checksum;
        player.checksums.push(ChecksumCheck {
            timestamp_ms: now_ms,
            provided: client_checksum.to_string(),
            expected: expected_checksum.to_string(),
            valid,
        });
        self.bump_checks(session_id);

        if !valid {
            self.record_violation(
                session_id,
                address,
                ViolationDetails::ClientIntegrity {
                    provided: client_checksum.to_string(),
                    expected: expected_checksum.to_string(),
                },
                now_ms,
            );
        }

        Ok(IntegrityOutcome { valid })
    }

    /// Track a movement sample and flag speeds beyond
    /// `max_speed * SPEED_TOLERANCE`.
    pub fn detect_speed_hack(
        &mut self,
        session_id: &str,
        address: &str,
        sample: MovementSample,
        max_speed: f64,
    ) -> Result<SpeedOutcome, AntiCheatError> {
        let player = self.player_mut(session_id, address)?;
        player.movements.push(sample);
        self.bump_checks(session_id);

        let player = self.player_ref(session_id, address)?;
        let count = player.movements.len();
        if count < 2 {
            return Ok(SpeedOutcome {
                detected: false,
                speed: None,
                max_speed,
            });
        }

        let previous = player.movements[count - 2];
        let elapsed_secs =
            sample.timestamp_ms.saturating_sub(previous.timestamp_ms) as f64 / 1000.0;
        if elapsed_secs == 0.0 {
            return Ok(SpeedOutcome {
                detected: false,
                speed: None,
                max_speed,
            });
        }

        let dx = sample.x - previous.x;
        let dy = sample.y - previous.y;
        let dz = sample.z - previous.z;
        let distance = (dx * dx + dy * dy + dz * dz).sqrt();
        let speed = distance / elapsed_secs;
        let detected = speed > max_speed * SPEED_TOLERANCE;

        if detected {
            self.record_violation(
                session_id,
                address,
                ViolationDetails::SpeedHack {
                    speed,
                    max_speed,
                    distance,
                    elapsed_secs,
                },
                sample.timestamp_ms,
            );
        }

        Ok(SpeedOutcome {
            detected,
            speed: Some(speed),
            max_speed,
        })
    }

    /// Log a typed action and flag same-type gaps below the cooldown.
    /// The action log is pruned to the rolling 60-second window.
    pub fn detect_impossible_action(
        &mut self,
        session_id: &str,
        address: &str,
        action: &str,
        success: bool,
        min_cooldown_ms: u64,
        now_ms: TimestampMs,
    ) -> Result<CooldownOutcome, AntiCheatError> {
        let player = self.player_mut(session_id, address)?;

        let previous = player
            .actions
            .iter()
            .rev()
            .find(|a| a.kind == action)
            .map(|a| a.timestamp_ms);

        player.actions.push(ActionSample {
            kind: action.to_string(),
            timestamp_ms: now_ms,
            success,
        });
        player
            .actions
            .retain(|a| now_ms.saturating_sub(a.timestamp_ms) < ACTION_WINDOW_MS);
        self.bump_checks(session_id);

        let gap_ms = previous.map(|t| now_ms.saturating_sub(t));
        let detected = matches!(gap_ms, Some(gap) if gap < min_cooldown_ms);

        if detected {
            self.record_violation(
                session_id,
                address,
                ViolationDetails::ImpossibleAction {
                    action: action.to_string(),
                    gap_ms: gap_ms.unwrap_or(0),
                    min_cooldown_ms,
                },
                now_ms,
            );
        }

        Ok(CooldownOutcome {
            detected,
            gap_ms,
            min_cooldown_ms,
        })
    }

    /// Analyze the action log for automation: metronome timing, repeated
    /// subsequences, and inhuman success rates.
    pub fn detect_botting(
        &mut self,
        session_id: &str,
        address: &str,
        now_ms: TimestampMs,
    ) -> Result<BottingOutcome, AntiCheatError> {
        let player = self.player_ref(session_id, address)?;

        if player.actions.len() < BOTTING_MIN_ACTIONS {
            return Ok(BottingOutcome {
                detected: false,
                confidence: 0,
                low_timing_variance: false,
                repetitive_pattern: false,
                inhuman_consistency: false,
            });
        }

        let recent: Vec<&ActionSample> = player
            .actions
            .iter()
            .skip(player.actions.len().saturating_sub(100))
            .collect();

        let timings: Vec<f64> = recent
            .windows(2)
            .map(|w| w[1].timestamp_ms.saturating_sub(w[0].timestamp_ms) as f64)
            .collect();
        let std_dev = std_deviation(&timings);
        let low_timing_variance = std_dev < 50.0 && timings.len() > 20;

        let joined = recent
            .iter()
            .map(|a| a.kind.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let repetitive_pattern = has_repeated_subsequence(&joined);

        let successes = player.actions.iter().filter(|a| a.success).count();
        let success_rate = successes as f64 / player.actions.len() as f64;
        let inhuman_consistency = success_rate > 0.95;

        let mut score = 0u32;
        if low_timing_variance {
            score += 40;
        }
        if repetitive_pattern {
            score += 30;
        }
        if inhuman_consistency {
            score += 30;
        }

        let detected = score > 60;
        self.bump_checks(session_id);

        if detected {
            self.record_violation(
                session_id,
                address,
                ViolationDetails::Botting {
                    suspicion_score: score,
                    timing_std_dev_ms: std_dev,
                    repetitive_pattern,
                    success_rate,
                },
                now_ms,
            );
        }

        Ok(BottingOutcome {
            detected,
            confidence: score.min(100),
            low_timing_variance,
            repetitive_pattern,
            inhuman_consistency,
        })
    }

    /// Score submitted combat statistics for aim assistance.
    pub fn detect_aim_assist(
        &mut self,
        session_id: &str,
        address: &str,
        stats: CombatStats,
        now_ms: TimestampMs,
    ) -> Result<AimAssistOutcome, AntiCheatError> {
        self.player_ref(session_id, address)?;
        self.bump_checks(session_id);

        let mut score = 0u32;

        if stats.headshot_percentage > 80.0 {
            score += 40;
        } else if stats.headshot_percentage > 65.0 {
            score += 20;
        }

        if stats.hit_rate > 90.0 {
            score += 30;
        } else if stats.hit_rate > 75.0 {
            score += 15;
        }

        if stats.wall_tracking_score > 0.7 {
            score += 30;
        }

        let detected = score > 50;

        if detected {
            self.record_violation(
                session_id,
                address,
                ViolationDetails::AimAssist {
                    suspicion_score: score,
                    headshot_percentage: stats.headshot_percentage,
                    hit_rate: stats.hit_rate,
                    wall_tracking_score: stats.wall_tracking_score,
                },
                now_ms,
            );
        }

        Ok(AimAssistOutcome {
            detected,
            confidence: score.min(100),
        })
    }

    /// Liveness probe. A gap beyond `max_interval_ms` records a low
    /// violation; the heartbeat is refreshed either way.
    pub fn check_heartbeat(
        &mut self,
        session_id: &str,
        address: &str,
        max_interval_ms: u64,
        now_ms: TimestampMs,
    ) -> Result<HeartbeatOutcome, AntiCheatError> {
        let player = self.player_mut(session_id, address)?;
        let gap_ms = now_ms.saturating_sub(player.last_heartbeat_ms);
        let alive = gap_ms < max_interval_ms;
        player.last_heartbeat_ms = now_ms;
        self.bump_checks(session_id);

        if !alive {
            self.record_violation(
                session_id,
                address,
                ViolationDetails::NoHeartbeat {
                    gap_ms,
                    max_interval_ms,
                },
                now_ms,
            );
        }

        Ok(HeartbeatOutcome { alive, gap_ms })
    }

    /// Decide a ban for an address. Enforcement stays with the caller.
    pub fn ban_player(
        &mut self,
        address: &str,
        reason: impl Into<String>,
        now_ms: TimestampMs,
    ) -> BanRecord {
        let record = BanRecord {
            address: address.to_string(),
            reason: reason.into(),
            timestamp_ms: now_ms,
            violation_count: self.violations.get(address).map(Vec::len).unwrap_or(0),
        };

        warn!(address, reason = %record.reason, "player banned");
        self.bans.insert(address.to_string(), record.clone());
        record
    }

    /// Whether the address has a standing ban.
    pub fn is_banned(&self, address: &str) -> bool {
        self.bans.contains_key(address)
    }

    /// The standing ban record for an address, if any.
    pub fn ban_record(&self, address: &str) -> Option<&BanRecord> {
        self.bans.get(address)
    }

    /// Lifetime violation history for an address.
    pub fn get_violations(&self, address: &str) -> &[Violation] {
        self.violations.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Audit document for a session.
    pub fn generate_report(
        &self,
        session_id: &str,
        now_ms: TimestampMs,
    ) -> Result<SessionReport, AntiCheatError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| AntiCheatError::SessionNotFound(session_id.to_string()))?;

        let players = session
            .players
            .values()
            .map(|p| PlayerReport {
                address: p.address.clone(),
                violation_count: p.violation_count,
                suspicious: p.suspicious,
                checksum_verifications: p.checksums.len(),
                actions_tracked: p.actions.len(),
                movements_tracked: p.movements.len(),
            })
            .collect();

        Ok(SessionReport {
            session_id: session_id.to_string(),
            duration_ms: now_ms.saturating_sub(session.started_at_ms),
            checks_performed: session.checks_performed,
            violations: session.violations.clone(),
            players,
        })
    }

    /// Drop session trackers older than `max_age_ms`. Violation
    /// histories and bans are address-scoped and survive the sweep.
    pub fn cleanup(&mut self, max_age_ms: u64, now_ms: TimestampMs) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now_ms.saturating_sub(session.started_at_ms) <= max_age_ms);
        before - self.sessions.len()
    }

    fn record_violation(
        &mut self,
        session_id: &str,
        address: &str,
        details: ViolationDetails,
        now_ms: TimestampMs,
    ) {
        let kind = details.kind();
        let severity = kind.severity();
        let violation = Violation {
            session_id: session_id.to_string(),
            address: address.to_string(),
            kind,
            severity,
            details,
            timestamp_ms: now_ms,
        };

        if let Some(session) = self.sessions.get_mut(session_id) {
            session.violations.push(violation.clone());
            if let Some(player) = session.players.get_mut(address) {
                player.violation_count += 1;
                player.suspicious = player.violation_count > 2;
            }
        }

        let history = self.violations.entry(address.to_string()).or_default();
        history.push(violation);
        let lifetime = history.len();

        warn!(session_id, address, %kind, ?severity, lifetime, "violation recorded");

        if severity == Severity::Critical || lifetime > AUTO_BAN_VIOLATION_LIMIT {
            self.ban_player(address, format!("Automatic ban: {kind}"), now_ms);
        }
    }

    fn bump_checks(&mut self, session_id: &str) {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.checks_performed += 1;
        }
    }

    fn player_mut(
        &mut self,
        session_id: &str,
        address: &str,
    ) -> Result<&mut PlayerTracker, AntiCheatError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| AntiCheatError::SessionNotFound(session_id.to_string()))?;
        session
            .players
            .get_mut(address)
            .ok_or_else(|| AntiCheatError::PlayerNotTracked {
                session_id: session_id.to_string(),
                address: address.to_string(),
            })
    }

    fn player_ref(
        &self,
        session_id: &str,
        address: &str,
    ) -> Result<&PlayerTracker, AntiCheatError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| AntiCheatError::SessionNotFound(session_id.to_string()))?;
        session
            .players
            .get(address)
            .ok_or_else(|| AntiCheatError::PlayerNotTracked {
                session_id: session_id.to_string(),
                address: address.to_string(),
            })
    }
}

fn std_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Scan for a subsequence of at least 3 characters repeated 4 or more
/// times back-to-back in the comma-joined action string.
fn has_repeated_subsequence(joined: &str) -> bool {
    let bytes = joined.as_bytes();
    let n = bytes.len();

    for len in 3..=n / 4 {
        for start in 0..=n - 4 * len {
            let pattern = &bytes[start..start + len];
            if (1..4).all(|k| &bytes[start + k * len..start + (k + 1) * len] == pattern) {
                return true;
            }
        }
    }
    false
}

// =============================================================================
// TESTS
// =============================================================================
