//! Session Registry
//!
//! Owns one instance of every engine and wires the per-session
//! lifecycle: open a session and the state authority, anti-cheat
//! tracking, replay recording and a committed RNG session all come up
//! together; close it and the audit artifacts come back for external
//! persistence. A host can run several registries side by side to
//! shard sessions; nothing here is global.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::anticheat::engine::{AntiCheatEngine, AntiCheatError};
use crate::anticheat::violation::SessionReport;
use crate::core::hash::ChecksumHex;
use crate::core::value::StateValue;
use crate::fairness::rng::RngSession;
use crate::matchmaker::engine::Matchmaker;
use crate::replay::recorder::{
    RecordingInfo, RecordingSummary, ReplayConfig, ReplayError, ReplayRecorder,
};
use crate::sync::engine::{
    ExportedState, StateSnapshot, StateSynchronizer, SyncConfig, SyncError,
};
use crate::{TimestampMs, DEFAULT_MAX_SESSION_AGE_MS};

/// Errors surfaced by registry-level lifecycle calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Session was not opened through this registry.
    #[error("session {0} not registered")]
    SessionNotFound(String),

    /// State synchronizer error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Anti-cheat error.
    #[error(transparent)]
    AntiCheat(#[from] AntiCheatError),

    /// Replay error.
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// Per-registry configuration applied to every opened session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// State synchronization config.
    pub sync: SyncConfig,
    /// Replay recording config.
    pub replay: ReplayConfig,
}

/// Everything the orchestrator needs after opening a session.
#[derive(Clone, Debug)]
pub struct OpenedSession {
    /// Session identifier.
    pub session_id: String,
    /// Initial state snapshot at version 0.
    pub state: StateSnapshot,
    /// Replay recording receipt.
    pub recording: RecordingInfo,
    /// RNG commitment to publish to clients before play.
    pub rng_commitment: ChecksumHex,
}

/// Audit artifacts produced by closing a session, ready for the
/// external persistence layer.
#[derive(Clone, Debug)]
pub struct ClosedSession {
    /// Anti-cheat audit report.
    pub report: SessionReport,
    /// Finalized replay summary.
    pub replay: RecordingSummary,
    /// Full state export.
    pub state: ExportedState,
    /// Server seed, revealed now that the session's rounds are final.
    pub revealed_server_seed: String,
}

/// Counts removed by a cleanup sweep, per engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// State sessions dropped.
    pub state_sessions: usize,
    /// Anti-cheat session trackers dropped.
    pub anticheat_sessions: usize,
    /// Queue entries and stale matches dropped.
    pub matchmaking_entries: usize,
    /// Abandoned recordings dropped.
    pub recordings: usize,
    /// RNG sessions dropped.
    pub rng_sessions: usize,
}

/// The orchestrator-facing facade over all five engines.
#[derive(Default)]
pub struct SessionRegistry {
    config: RegistryConfig,
    sync: StateSynchronizer,
    anticheat: AntiCheatEngine,
    matchmaker: Matchmaker,
    replays: ReplayRecorder,
    rng_sessions: BTreeMap<String, RngSession>,
}

impl SessionRegistry {
    /// Registry with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with explicit configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Wall-clock timestamp for hosts that do not keep their own.
    pub fn now_ms() -> TimestampMs {
        chrono::Utc::now().timestamp_millis() as TimestampMs
    }

    /// Open a session: state authority at version 0, anti-cheat
    /// tracking, replay recording and a fresh committed RNG session.
    pub fn open_session(
        &mut self,
        session_id: &str,
        players: &[String],
        initial_state: StateValue,
        now_ms: TimestampMs,
    ) -> OpenedSession {
        self.anticheat.init_session(session_id, players, now_ms);
        let state =
            self.sync
                .initialize_state(session_id, initial_state, self.config.sync.clone(), now_ms);

        let extra = StateValue::map_from([(
            "players",
            StateValue::List(
                players
                    .iter()
                    .map(|p| StateValue::from(p.as_str()))
                    .collect(),
            ),
        )]);
        let recording =
            self.replays
                .start_recording(session_id, extra, self.config.replay, now_ms);

        let rng = RngSession::create(now_ms);
        let rng_commitment = rng.server_seed_hash.clone();
        self.rng_sessions.insert(session_id.to_string(), rng);

        info!(session_id, players = players.len(), "session opened");

        OpenedSession {
            session_id: session_id.to_string(),
            state,
            recording,
            rng_commitment,
        }
    }

    /// Close a session: stop the recording, emit the anti-cheat report,
    /// export the final state and reveal the server seed.
    pub fn close_session(
        &mut self,
        session_id: &str,
        final_stats: StateValue,
        now_ms: TimestampMs,
    ) -> Result<ClosedSession, RegistryError> {
        let rng = self
            .rng_sessions
            .remove(session_id)
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.to_string()))?;

        let report = self.anticheat.generate_report(session_id, now_ms)?;
        let replay = self.replays.stop_recording(session_id, final_stats, now_ms)?;
        let state = self.sync.export_state(session_id)?;

        info!(
            session_id,
            violations = report.violations.len(),
            "session closed"
        );

        Ok(ClosedSession {
            report,
            replay,
            state,
            revealed_server_seed: rng.server_seed,
        })
    }

    /// The state synchronizer.
    pub fn state_sync(&mut self) -> &mut StateSynchronizer {
        &mut self.sync
    }

    /// The anti-cheat engine.
    pub fn anticheat(&mut self) -> &mut AntiCheatEngine {
        &mut self.anticheat
    }

    /// The matchmaker.
    pub fn matchmaker(&mut self) -> &mut Matchmaker {
        &mut self.matchmaker
    }

    /// The replay recorder.
    pub fn replays(&mut self) -> &mut ReplayRecorder {
        &mut self.replays
    }

    /// The RNG session for an open session.
    pub fn rng_session(&mut self, session_id: &str) -> Option<&mut RngSession> {
        self.rng_sessions.get_mut(session_id)
    }

    /// Sweep every engine for session-scoped data older than
    /// `max_age_ms` (defaulting to one hour when `None`). The host
    /// invokes this periodically; nothing here self-schedules.
    pub fn cleanup(&mut self, max_age_ms: Option<u64>, now_ms: TimestampMs) -> CleanupReport {
        let max_age_ms = max_age_ms.unwrap_or(DEFAULT_MAX_SESSION_AGE_MS);

        let rng_before = self.rng_sessions.len();
        self.rng_sessions
            .retain(|_, rng| now_ms.saturating_sub(rng.created_at_ms) <= max_age_ms);

        let report = CleanupReport {
            state_sessions: self.sync.cleanup(max_age_ms, now_ms),
            anticheat_sessions: self.anticheat.cleanup(max_age_ms, now_ms),
            matchmaking_entries: self.matchmaker.cleanup(max_age_ms, now_ms),
            recordings: self.replays.cleanup(max_age_ms, now_ms),
            rng_sessions: rng_before - self.rng_sessions.len(),
        };

        info!(?report, "cleanup sweep");
        report
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anticheat::engine::MovementSample;
    use crate::fairness::rng::{hash_seed, verify};
    use crate::replay::recorder::EventKind;

    const T0: TimestampMs = 1_700_000_000_000;

    fn players() -> Vec<String> {
        vec!["alice".to_string(), "bob".to_string()]
    }

    fn initial_state() -> StateValue {
        StateValue::map_from([("round", StateValue::from(1i64))])
    }

    #[test]
    fn test_open_session_wires_every_engine() {
        let mut registry = SessionRegistry::new();
        let opened = registry.open_session("s1", &players(), initial_state(), T0);

        assert_eq!(opened.state.version, 0);
        assert_eq!(opened.recording.session_id, "s1");
        assert_eq!(opened.rng_commitment.len(), 64);

        // Commitment matches the secret seed held for the session.
        let rng = registry.rng_session("s1").unwrap();
        assert_eq!(hash_seed(&rng.server_seed), opened.rng_commitment);

        // State, tracking and recording all answer for the session.
        assert!(registry.state_sync().get_state("s1").is_some());
        assert!(registry.anticheat().generate_report("s1", T0).is_ok());
        assert!(registry
            .replays()
            .record_event("s1", EventKind::MatchWon, StateValue::Null, T0 + 1)
            .is_ok());
    }

    #[test]
    fn test_full_session_round_trip() {
        let mut registry = SessionRegistry::new();
        let opened = registry.open_session("s1", &players(), initial_state(), T0);

        // A provably fair roll under the session's committed seeds.
        let rng = registry.rng_session("s1").unwrap();
        let client_seed = rng.client_seed.clone();
        let roll = rng.roll(0, 36).unwrap();
        assert_eq!(roll.server_seed_hash, opened.rng_commitment);

        // Commit the outcome and some telemetry.
        registry
            .state_sync()
            .update_state(
                "s1",
                StateValue::map_from([("last_roll", StateValue::from(roll.result))]),
                Some("server"),
                T0 + 100,
            )
            .unwrap();
        registry
            .anticheat()
            .detect_speed_hack(
                "s1",
                "alice",
                MovementSample {
                    x: 1.0,
                    y: 0.0,
                    z: 0.0,
                    timestamp_ms: T0 + 100,
                },
                10.0,
            )
            .unwrap();
        registry
            .replays()
            .record_event("s1", EventKind::MatchWon, StateValue::Null, T0 + 200)
            .unwrap();

        let closed = registry
            .close_session("s1", StateValue::Null, T0 + 1000)
            .unwrap();

        // The reveal verifies the roll made during the session.
        assert_eq!(hash_seed(&closed.revealed_server_seed), opened.rng_commitment);
        assert!(verify(
            &closed.revealed_server_seed,
            &client_seed,
            roll.nonce,
            roll.result,
            0,
            36
        )
        .unwrap());

        assert_eq!(closed.state.state.version, 1);
        assert_eq!(closed.replay.event_count, 1);
        assert_eq!(closed.report.players.len(), 2);

        // Closing twice is a misuse error.
        assert!(matches!(
            registry.close_session("s1", StateValue::Null, T0 + 2000),
            Err(RegistryError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_cleanup_sweeps_all_engines() {
        let mut registry = SessionRegistry::new();
        registry.open_session("old", &players(), initial_state(), T0);

        let later = T0 + DEFAULT_MAX_SESSION_AGE_MS + 1;
        registry.open_session("fresh", &players(), initial_state(), later);

        let report = registry.cleanup(None, later + 1);
        assert_eq!(report.state_sessions, 1);
        assert_eq!(report.anticheat_sessions, 1);
        assert_eq!(report.recordings, 1);
        assert_eq!(report.rng_sessions, 1);

        assert!(registry.state_sync().get_state("old").is_none());
        assert!(registry.state_sync().get_state("fresh").is_some());
        assert!(registry.rng_session("fresh").is_some());
        assert!(registry.rng_session("old").is_none());
    }
}
