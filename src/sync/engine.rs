//! State Synchronizer
//!
//! Single-writer-per-session authority over a versioned state tree.
//! Every committed update bumps the version and recomputes the
//! checksum; clients compare checksums to detect desync without
//! transferring the payload, and rollback restores a checkpoint while
//! keeping versions strictly increasing.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::hash::{state_checksum, ChecksumHex};
use crate::core::value::{StateValue, ValueDiff};
use crate::TimestampMs;

/// Maximum retained checkpoints per session.
pub const CHECKPOINT_LIMIT: usize = 100;

/// Per-session synchronization configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum history entries retained (ring buffer).
    pub history_limit: usize,
    /// Minimum time between automatic checkpoints.
    pub snapshot_interval_ms: u64,
    /// Whether rollback is permitted for this session.
    pub enable_rollback: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            history_limit: 1000,
            snapshot_interval_ms: 5000,
            enable_rollback: true,
        }
    }
}

/// Errors raised on caller misuse. Read probes (`get_state`,
/// `validate_checksum`) return `Option`/`bool` instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// No state initialized for the session.
    #[error("session {0} not found")]
    SessionNotFound(String),

    /// Mutation attempted while the state is locked.
    #[error("state for session {0} is locked")]
    StateLocked(String),

    /// Rollback attempted with rollback disabled in config.
    #[error("rollback is disabled for session {0}")]
    RollbackDisabled(String),

    /// Requested checkpoint does not exist.
    #[error("checkpoint at version {version} not found for session {session_id}")]
    CheckpointNotFound {
        /// Session the rollback targeted.
        session_id: String,
        /// Requested checkpoint version (u64::MAX when unnamed and no
        /// checkpoint exists at all).
        version: u64,
    },

    /// A diff endpoint version is not available in history.
    #[error("version {version} not available for session {session_id}")]
    VersionNotFound {
        /// Session the diff targeted.
        session_id: String,
        /// Missing version.
        version: u64,
    },

    /// Client reported a version newer than the authority. Protocol
    /// anomaly: cannot happen with a correct client.
    #[error("client version {client_version} ahead of server version {server_version}")]
    ClientAhead {
        /// Authoritative version.
        server_version: u64,
        /// Version the client claimed.
        client_version: u64,
    },
}

/// Immutable copy of state at a version, used for rollback targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Version the checkpoint was taken at.
    pub version: u64,
    /// Deep copy of the data tree.
    pub data: StateValue,
    /// When the checkpoint was taken.
    pub timestamp_ms: TimestampMs,
    /// Checksum at that version.
    pub checksum: ChecksumHex,
}

/// One history entry: the state as it was *before* an update committed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Version the recorded data belongs to.
    pub version: u64,
    /// Data tree at that version.
    pub data: StateValue,
    /// When the superseding update committed.
    pub timestamp_ms: TimestampMs,
    /// Actor that committed the superseding update, if reported.
    pub actor: Option<String>,
}

/// Authoritative metadata for a session's state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionStateInfo {
    /// Session identifier.
    pub session_id: String,
    /// Monotonic version, starting at 0.
    pub version: u64,
    /// Current data tree.
    pub data: StateValue,
    /// Checksum of the canonical serialization of `data`.
    pub checksum: ChecksumHex,
    /// Coarse mutation gate; pauses all updates while set.
    pub locked: bool,
    /// Session configuration.
    pub config: SyncConfig,
    /// Last commit (or initialization) time.
    pub updated_at_ms: TimestampMs,
}

/// Read-path copy of current state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Current version.
    pub version: u64,
    /// Deep copy of the data tree.
    pub data: StateValue,
    /// Current checksum.
    pub checksum: ChecksumHex,
    /// Last commit time.
    pub timestamp_ms: TimestampMs,
}

/// Receipt returned from a committed update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateReceipt {
    /// Version after the commit.
    pub version: u64,
    /// Checksum after the commit.
    pub checksum: ChecksumHex,
    /// Commit time.
    pub timestamp_ms: TimestampMs,
}

/// Response to a client sync probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SyncResponse {
    /// Client matches the authority; nothing to send.
    InSync {
        /// Authoritative version.
        version: u64,
        /// Authoritative checksum.
        checksum: ChecksumHex,
    },
    /// Client is behind; carries the full payload plus a diff when the
    /// client's version is still in history.
    Behind {
        /// Authoritative version.
        version: u64,
        /// Full authoritative data.
        data: StateValue,
        /// Authoritative checksum.
        checksum: ChecksumHex,
        /// Diff from the client's version, when resolvable.
        diff: Option<ValueDiff>,
    },
}

/// Full serialization of a session for external persistence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportedState {
    /// Session identifier.
    pub session_id: String,
    /// Authoritative state.
    pub state: SessionStateInfo,
    /// History ring contents, oldest first.
    pub history: Vec<HistoryEntry>,
    /// Checkpoint list, oldest first.
    pub checkpoints: Vec<Checkpoint>,
}

impl ExportedState {
    /// Byte encoding for the persistence layer.
    ///
    /// JSON rather than a compact binary codec: the state tree is
    /// schema-agnostic, and only a self-describing format can decode it.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("exported state serialization cannot fail")
    }

    /// Decode a previously exported state.
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Aggregate counters across all sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Sessions currently tracked.
    pub active_sessions: usize,
    /// Checkpoints across all sessions.
    pub total_checkpoints: usize,
    /// History entries across all sessions.
    pub total_history: usize,
}

struct SessionRecord {
    state: SessionStateInfo,
    history: VecDeque<HistoryEntry>,
    checkpoints: Vec<Checkpoint>,
}

/// Versioned, checksummed state authority for many sessions.
#[derive(Default)]
pub struct StateSynchronizer {
    sessions: BTreeMap<String, SessionRecord>,
}

impl StateSynchronizer {
    /// Create an empty synchronizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize state for a session at version 0 and take the initial
    /// checkpoint. Re-initializing an existing session replaces it.
    pub fn initialize_state(
        &mut self,
        session_id: &str,
        initial: StateValue,
        config: SyncConfig,
        now_ms: TimestampMs,
    ) -> StateSnapshot {
        let checksum = state_checksum(&initial.canonical_json());
        let state = SessionStateInfo {
            session_id: session_id.to_string(),
            version: 0,
            data: initial,
            checksum,
            locked: false,
            config,
            updated_at_ms: now_ms,
        };

        let mut record = SessionRecord {
            state,
            history: VecDeque::new(),
            checkpoints: Vec::new(),
        };
        push_checkpoint(&mut record, now_ms);

        info!(session_id, "state initialized");
        self.sessions.insert(session_id.to_string(), record);
        self.snapshot_of(session_id).expect("just inserted")
    }

    /// Commit an update: merge into the tree, bump the version,
    /// recompute the checksum, auto-checkpoint when due.
    pub fn update_state(
        &mut self,
        session_id: &str,
        updates: StateValue,
        actor: Option<&str>,
        now_ms: TimestampMs,
    ) -> Result<UpdateReceipt, SyncError> {
        let record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))?;

        if record.state.locked {
            return Err(SyncError::StateLocked(session_id.to_string()));
        }

        // Record the pre-update state so diffs against this version keep
        // working after the commit.
        record.history.push_back(HistoryEntry {
            version: record.state.version,
            data: record.state.data.clone(),
            timestamp_ms: now_ms,
            actor: actor.map(str::to_string),
        });
        while record.history.len() > record.state.config.history_limit {
            record.history.pop_front();
        }

        record.state.data.deep_merge(updates);
        record.state.version += 1;
        record.state.updated_at_ms = now_ms;
        record.state.checksum = state_checksum(&record.state.data.canonical_json());

        if checkpoint_due(record, now_ms) {
            push_checkpoint(record, now_ms);
        }

        debug!(
            session_id,
            version = record.state.version,
            "state updated"
        );

        Ok(UpdateReceipt {
            version: record.state.version,
            checksum: record.state.checksum.clone(),
            timestamp_ms: now_ms,
        })
    }

    /// Current state copy, or None for unknown sessions.
    pub fn get_state(&self, session_id: &str) -> Option<StateSnapshot> {
        self.snapshot_of(session_id)
    }

    /// Compare a client checksum with the authority's. False for
    /// unknown sessions.
    pub fn validate_checksum(&self, session_id: &str, client_checksum: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(|r| r.state.checksum == client_checksum)
            .unwrap_or(false)
    }

    /// Take an explicit checkpoint of the current state.
    pub fn take_snapshot(
        &mut self,
        session_id: &str,
        now_ms: TimestampMs,
    ) -> Result<Checkpoint, SyncError> {
        let record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))?;
        Ok(push_checkpoint(record, now_ms))
    }

    /// Restore the most recent (or a named) checkpoint.
    ///
    /// The restored state gets `checkpoint.version + 1`, so versions
    /// never repeat even across a rollback.
    pub fn rollback(
        &mut self,
        session_id: &str,
        version: Option<u64>,
        now_ms: TimestampMs,
    ) -> Result<StateSnapshot, SyncError> {
        let record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))?;

        if !record.state.config.enable_rollback {
            return Err(SyncError::RollbackDisabled(session_id.to_string()));
        }

        let target = match version {
            Some(v) => record.checkpoints.iter().find(|c| c.version == v),
            None => record.checkpoints.last(),
        }
        .ok_or(SyncError::CheckpointNotFound {
            session_id: session_id.to_string(),
            version: version.unwrap_or(u64::MAX),
        })?
        .clone();

        record.state.data = target.data;
        record.state.version = target.version + 1;
        record.state.updated_at_ms = now_ms;
        record.state.checksum = state_checksum(&record.state.data.canonical_json());

        info!(
            session_id,
            checkpoint_version = target.version,
            restored_version = record.state.version,
            "state rolled back"
        );

        Ok(self.snapshot_of(session_id).expect("session exists"))
    }

    /// Pause all mutation for the session (dispute review and the like).
    pub fn lock(&mut self, session_id: &str) -> Result<(), SyncError> {
        let record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))?;
        record.state.locked = true;
        Ok(())
    }

    /// Resume mutation for the session.
    pub fn unlock(&mut self, session_id: &str) -> Result<(), SyncError> {
        let record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))?;
        record.state.locked = false;
        Ok(())
    }

    /// Structural diff of top-level keys between two versions.
    ///
    /// Versions are resolved from history, checkpoints, or the live
    /// state, in that order.
    pub fn get_diff(
        &self,
        session_id: &str,
        from_version: u64,
        to_version: u64,
    ) -> Result<ValueDiff, SyncError> {
        let record = self
            .sessions
            .get(session_id)
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))?;

        let from = resolve_version(record, from_version).ok_or(SyncError::VersionNotFound {
            session_id: session_id.to_string(),
            version: from_version,
        })?;
        let to = resolve_version(record, to_version).ok_or(SyncError::VersionNotFound {
            session_id: session_id.to_string(),
            version: to_version,
        })?;

        Ok(ValueDiff::between(from, to))
    }

    /// Resolve a client's reported version against the authority.
    pub fn sync_state(
        &self,
        session_id: &str,
        player_id: &str,
        client_version: u64,
    ) -> Result<SyncResponse, SyncError> {
        let record = self
            .sessions
            .get(session_id)
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))?;

        let server_version = record.state.version;

        if client_version == server_version {
            return Ok(SyncResponse::InSync {
                version: server_version,
                checksum: record.state.checksum.clone(),
            });
        }

        if client_version < server_version {
            debug!(
                session_id,
                player_id, client_version, server_version, "client behind, resyncing"
            );
            return Ok(SyncResponse::Behind {
                version: server_version,
                data: record.state.data.clone(),
                checksum: record.state.checksum.clone(),
                diff: self.get_diff(session_id, client_version, server_version).ok(),
            });
        }

        warn!(
            session_id,
            player_id, client_version, server_version, "client ahead of authority"
        );
        Err(SyncError::ClientAhead {
            server_version,
            client_version,
        })
    }

    /// Last `limit` history entries, oldest first.
    pub fn get_history(&self, session_id: &str, limit: usize) -> Vec<HistoryEntry> {
        self.sessions
            .get(session_id)
            .map(|record| {
                let skip = record.history.len().saturating_sub(limit);
                record.history.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Serialize a session (state + history + checkpoints) for the
    /// external persistence layer.
    pub fn export_state(&self, session_id: &str) -> Result<ExportedState, SyncError> {
        let record = self
            .sessions
            .get(session_id)
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))?;

        Ok(ExportedState {
            session_id: session_id.to_string(),
            state: record.state.clone(),
            history: record.history.iter().cloned().collect(),
            checkpoints: record.checkpoints.clone(),
        })
    }

    /// Reconstruct a session from an export. Missing history or
    /// checkpoints default to empty; the imported state arrives
    /// unlocked.
    pub fn import_state(&mut self, exported: ExportedState) {
        let mut state = exported.state;
        state.locked = false;

        info!(session_id = %exported.session_id, version = state.version, "state imported");

        self.sessions.insert(
            exported.session_id,
            SessionRecord {
                state,
                history: exported.history.into(),
                checkpoints: exported.checkpoints,
            },
        );
    }

    /// Drop sessions whose last commit is older than `max_age_ms`.
    /// Returns the number removed.
    pub fn cleanup(&mut self, max_age_ms: u64, now_ms: TimestampMs) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, record| now_ms.saturating_sub(record.state.updated_at_ms) <= max_age_ms);
        before - self.sessions.len()
    }

    /// Aggregate counters across all sessions.
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            active_sessions: self.sessions.len(),
            total_checkpoints: self.sessions.values().map(|r| r.checkpoints.len()).sum(),
            total_history: self.sessions.values().map(|r| r.history.len()).sum(),
        }
    }

    fn snapshot_of(&self, session_id: &str) -> Option<StateSnapshot> {
        self.sessions.get(session_id).map(|record| StateSnapshot {
            version: record.state.version,
            data: record.state.data.clone(),
            checksum: record.state.checksum.clone(),
            timestamp_ms: record.state.updated_at_ms,
        })
    }
}

fn push_checkpoint(record: &mut SessionRecord, now_ms: TimestampMs) -> Checkpoint {
    let checkpoint = Checkpoint {
        version: record.state.version,
        data: record.state.data.clone(),
        timestamp_ms: now_ms,
        checksum: record.state.checksum.clone(),
    };

    record.checkpoints.push(checkpoint.clone());
    if record.checkpoints.len() > CHECKPOINT_LIMIT {
        record.checkpoints.remove(0);
    }

    checkpoint
}

fn checkpoint_due(record: &SessionRecord, now_ms: TimestampMs) -> bool {
    match record.checkpoints.last() {
        None => true,
        Some(last) => {
            now_ms.saturating_sub(last.timestamp_ms) >= record.state.config.snapshot_interval_ms
        }
    }
}

fn resolve_version(record: &SessionRecord, version: u64) -> Option<&StateValue> {
    if let Some(entry) = record.history.iter().find(|h| h.version == version) {
        return Some(&entry.data);
    }
    if let Some(checkpoint) = record.checkpoints.iter().find(|c| c.version == version) {
        return Some(&checkpoint.data);
    }
    if record.state.version == version {
        return Some(&record.state.data);
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================
