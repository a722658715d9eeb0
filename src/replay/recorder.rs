//! Replay Recorder
//!
//! Append-only recording of session events and frame snapshots. Every
//! entry carries an absolute timestamp plus the delta from the previous
//! entry of its kind, which is what playback paces itself by. Once a
//! recording is stopped it is immutable; compression is gzip over the
//! JSON encoding, carried base64 so it survives text transports.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::value::StateValue;
use crate::TimestampMs;

/// Replay format version stamped into every recording.
pub const REPLAY_VERSION: &str = "1.0.0";

/// Errors signalling caller misuse of the recorder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// No active recording for the session.
    #[error("no active recording for session {0}")]
    NotRecording(String),

    /// No completed replay with that id.
    #[error("replay {0} not found")]
    ReplayNotFound(String),

    /// Import payload did not decode in the declared format.
    #[error("replay decode failed: {0}")]
    DecodeFailed(String),
}

/// Closed taxonomy of recorded event kinds.
///
/// `Custom` carries game-specific kinds the engine has no opinion
/// about; the known variants are the ones highlight extraction and
/// playback tooling understand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A player input/action, wrapped by [`ReplayRecorder::record_action`].
    PlayerAction,
    /// A player left the session involuntarily.
    PlayerEliminated,
    /// The match was decided.
    MatchWon,
    /// An achievement fired.
    AchievementUnlocked,
    /// Caller-flagged spectacle.
    EpicMoment,
    /// A comeback as judged by the game rules.
    Comeback,
    /// Multiple eliminations in quick succession.
    Multikill,
    /// Any other game-specific kind.
    Custom(String),
}

impl EventKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::PlayerAction => "PLAYER_ACTION",
            EventKind::PlayerEliminated => "PLAYER_ELIMINATED",
            EventKind::MatchWon => "MATCH_WON",
            EventKind::AchievementUnlocked => "ACHIEVEMENT_UNLOCKED",
            EventKind::EpicMoment => "EPIC_MOMENT",
            EventKind::Comeback => "COMEBACK",
            EventKind::Multikill => "MULTIKILL",
            EventKind::Custom(name) => name,
        }
    }

    /// Parse a wire name; unknown names become `Custom`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "PLAYER_ACTION" => EventKind::PlayerAction,
            "PLAYER_ELIMINATED" => EventKind::PlayerEliminated,
            "MATCH_WON" => EventKind::MatchWon,
            "ACHIEVEMENT_UNLOCKED" => EventKind::AchievementUnlocked,
            "EPIC_MOMENT" => EventKind::EpicMoment,
            "COMEBACK" => EventKind::Comeback,
            "MULTIKILL" => EventKind::Multikill,
            other => EventKind::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(EventKind::from_name(&name))
    }
}

/// One recorded event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Game-supplied payload.
    pub data: StateValue,
    /// Absolute time of the event.
    pub timestamp_ms: TimestampMs,
    /// Delta from the previous event (0 for the first).
    pub delta_ms: u64,
    /// Frame the event is attributed to.
    pub frame: usize,
}

/// One recorded frame snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Frame index.
    pub index: usize,
    /// Absolute time of the snapshot.
    pub timestamp_ms: TimestampMs,
    /// Delta from the previous frame (0 for the first).
    pub delta_ms: u64,
    /// State snapshot supplied by the game loop.
    pub state: StateValue,
    /// Events attributed to this frame so far.
    pub event_count: usize,
}

/// Recording metadata, finalized by `stop_recording`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayMetadata {
    /// Replay format version.
    pub version: String,
    /// When recording started.
    pub started_at_ms: TimestampMs,
    /// When recording stopped; None while active.
    pub ended_at_ms: Option<TimestampMs>,
    /// Total duration; None while active.
    pub duration_ms: Option<u64>,
    /// Final event count; None while active.
    pub event_count: Option<usize>,
    /// Final frame count; None while active.
    pub frame_count: Option<usize>,
    /// Average frame spacing; None while active or without frames.
    pub average_frame_time_ms: Option<f64>,
    /// Caller-supplied metadata from `start_recording`.
    pub extra: StateValue,
    /// Caller-supplied statistics from `stop_recording`.
    pub final_stats: StateValue,
}

/// A complete recording: the unit of export, import and playback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Unique replay identifier.
    pub replay_id: String,
    /// Session the replay was recorded from.
    pub session_id: String,
    /// Metadata.
    pub metadata: ReplayMetadata,
    /// Ordered event log.
    pub events: Vec<ReplayEvent>,
    /// Indexed frame snapshots.
    pub frames: Vec<ReplayFrame>,
}

/// Recording configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Nominal frame rate the game loop records at.
    pub frame_rate: u32,
    /// Whether to compress the recording at stop.
    pub compression: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            compression: true,
        }
    }
}

/// Receipt returned when a recording starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    /// Assigned replay id.
    pub replay_id: String,
    /// Session being recorded.
    pub session_id: String,
    /// Start time.
    pub started_at_ms: TimestampMs,
}

/// Summary returned when a recording stops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    /// Replay id of the completed recording.
    pub replay_id: String,
    /// Total duration.
    pub duration_ms: u64,
    /// Events recorded.
    pub event_count: usize,
    /// Frames recorded.
    pub frame_count: usize,
    /// Stored size: compressed when compression ran, raw otherwise.
    pub size_bytes: usize,
    /// Compressed/original ratio when compression ran.
    pub compression_ratio: Option<f64>,
}

/// Listing entry for a completed replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayOverview {
    /// Replay id.
    pub replay_id: String,
    /// Source session.
    pub session_id: String,
    /// Duration, when finalized.
    pub duration_ms: Option<u64>,
    /// Event count.
    pub event_count: usize,
    /// Frame count.
    pub frame_count: usize,
    /// Stored size in bytes.
    pub size_bytes: usize,
    /// Whether a compressed payload is held.
    pub compressed: bool,
    /// Recording start time.
    pub created_at_ms: TimestampMs,
}

/// Export/import encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayFormat {
    /// Plain JSON.
    Json,
    /// Gzip over the JSON encoding.
    Binary,
}

/// Aggregate recorder counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStats {
    /// Completed replays held.
    pub total_replays: usize,
    /// Recordings currently active.
    pub active_recordings: usize,
    /// Stored bytes across completed replays.
    pub total_size_bytes: usize,
}

struct ActiveRecording {
    recording: Recording,
    config: ReplayConfig,
    last_event_ms: TimestampMs,
}

struct CompletedReplay {
    recording: Recording,
    /// Gzip+base64 payload when compression ran at stop.
    compressed: Option<String>,
    size_bytes: usize,
}

/// Event/frame recorder with active and completed stores.
#[derive(Default)]
pub struct ReplayRecorder {
    active: BTreeMap<String, ActiveRecording>,
    completed: BTreeMap<String, CompletedReplay>,
}

impl ReplayRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording a session. Restarting a session that is already
    /// recording discards the unfinished recording.
    pub fn start_recording(
        &mut self,
        session_id: &str,
        extra: StateValue,
        config: ReplayConfig,
        now_ms: TimestampMs,
    ) -> RecordingInfo {
        let replay_id = new_replay_id();
        let recording = Recording {
            replay_id: replay_id.clone(),
            session_id: session_id.to_string(),
            metadata: ReplayMetadata {
                version: REPLAY_VERSION.to_string(),
                started_at_ms: now_ms,
                ended_at_ms: None,
                duration_ms: None,
                event_count: None,
                frame_count: None,
                average_frame_time_ms: None,
                extra,
                final_stats: StateValue::Null,
            },
            events: Vec::new(),
            frames: Vec::new(),
        };

        info!(session_id, replay_id = %replay_id, "recording started");
        self.active.insert(
            session_id.to_string(),
            ActiveRecording {
                recording,
                config,
                last_event_ms: now_ms,
            },
        );

        RecordingInfo {
            replay_id,
            session_id: session_id.to_string(),
            started_at_ms: now_ms,
        }
    }

    /// Append an event to the session's active recording.
    pub fn record_event(
        &mut self,
        session_id: &str,
        kind: EventKind,
        data: StateValue,
        now_ms: TimestampMs,
    ) -> Result<(), ReplayError> {
        let active = self
            .active
            .get_mut(session_id)
            .ok_or_else(|| ReplayError::NotRecording(session_id.to_string()))?;

        let delta_ms = now_ms.saturating_sub(active.last_event_ms);
        active.recording.events.push(ReplayEvent {
            kind,
            data,
            timestamp_ms: now_ms,
            delta_ms,
            frame: active.recording.frames.len(),
        });
        active.last_event_ms = now_ms;
        Ok(())
    }

    /// Append a player action, wrapped as a `PlayerAction` event with
    /// the player and action folded into the payload.
    pub fn record_action(
        &mut self,
        session_id: &str,
        player_id: &str,
        action: &str,
        data: StateValue,
        now_ms: TimestampMs,
    ) -> Result<(), ReplayError> {
        let mut payload = StateValue::map_from([
            ("player_id", StateValue::from(player_id)),
            ("action", StateValue::from(action)),
        ]);
        payload.deep_merge(data);
        self.record_event(session_id, EventKind::PlayerAction, payload, now_ms)
    }

    /// Append a frame snapshot with the count of events attributed to
    /// it so far.
    pub fn record_frame(
        &mut self,
        session_id: &str,
        state: StateValue,
        now_ms: TimestampMs,
    ) -> Result<(), ReplayError> {
        let active = self
            .active
            .get_mut(session_id)
            .ok_or_else(|| ReplayError::NotRecording(session_id.to_string()))?;

        let index = active.recording.frames.len();
        let delta_ms = active
            .recording
            .frames
            .last()
            .map(|f| now_ms.saturating_sub(f.timestamp_ms))
            .unwrap_or(0);
        let event_count = active
            .recording
            .events
            .iter()
            .filter(|e| e.frame == index)
            .count();

        active.recording.frames.push(ReplayFrame {
            index,
            timestamp_ms: now_ms,
            delta_ms,
            state,
            event_count,
        });
        Ok(())
    }

    /// Finalize the session's recording: stamp metadata, optionally
    /// compress, and move it to the completed store. The recording is
    /// immutable afterwards.
    pub fn stop_recording(
        &mut self,
        session_id: &str,
        final_stats: StateValue,
        now_ms: TimestampMs,
    ) -> Result<RecordingSummary, ReplayError> {
        let mut active = self
            .active
            .remove(session_id)
            .ok_or_else(|| ReplayError::NotRecording(session_id.to_string()))?;

        let duration_ms = now_ms.saturating_sub(active.recording.metadata.started_at_ms);
        let event_count = active.recording.events.len();
        let frame_count = active.recording.frames.len();

        let metadata = &mut active.recording.metadata;
        metadata.ended_at_ms = Some(now_ms);
        metadata.duration_ms = Some(duration_ms);
        metadata.event_count = Some(event_count);
        metadata.frame_count = Some(frame_count);
        metadata.average_frame_time_ms = if frame_count > 0 {
            Some(duration_ms as f64 / frame_count as f64)
        } else {
            None
        };
        metadata.final_stats = final_stats;

        let original_size = encoded_size(&active.recording);
        let (compressed, size_bytes, compression_ratio) = if active.config.compression {
            let payload = compress_recording(&active.recording);
            let compressed_size = payload.len();
            let ratio = compressed_size as f64 / original_size as f64;
            (Some(payload), compressed_size, Some(ratio))
        } else {
            (None, original_size, None)
        };

        let replay_id = active.recording.replay_id.clone();
        info!(
            session_id,
            replay_id = %replay_id,
            duration_ms,
            event_count,
            frame_count,
            "recording stopped"
        );

        self.completed.insert(
            replay_id.clone(),
            CompletedReplay {
                recording: active.recording,
                compressed,
                size_bytes,
            },
        );

        Ok(RecordingSummary {
            replay_id,
            duration_ms,
            event_count,
            frame_count,
            size_bytes,
            compression_ratio,
        })
    }

    /// Retrieve a completed replay. Compressed replays are decoded from
    /// their compressed payload, which keeps the codec honest.
    pub fn get_replay(&self, replay_id: &str) -> Result<Recording, ReplayError> {
        let stored = self
            .completed
            .get(replay_id)
            .ok_or_else(|| ReplayError::ReplayNotFound(replay_id.to_string()))?;

        match &stored.compressed {
            Some(payload) => decompress_recording(payload),
            None => Ok(stored.recording.clone()),
        }
    }

    /// Listing entry for a completed replay.
    pub fn replay_metadata(&self, replay_id: &str) -> Result<ReplayOverview, ReplayError> {
        let stored = self
            .completed
            .get(replay_id)
            .ok_or_else(|| ReplayError::ReplayNotFound(replay_id.to_string()))?;
        Ok(overview(stored))
    }

    /// Serialize a completed replay for transport or storage.
    pub fn export_replay(
        &self,
        replay_id: &str,
        format: ReplayFormat,
    ) -> Result<Vec<u8>, ReplayError> {
        let recording = self.get_replay(replay_id)?;
        let json = serde_json::to_vec(&recording)
            .map_err(|e| ReplayError::DecodeFailed(e.to_string()))?;

        match format {
            ReplayFormat::Json => Ok(json),
            ReplayFormat::Binary => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(&json)
                    .map_err(|e| ReplayError::DecodeFailed(e.to_string()))?;
                encoder
                    .finish()
                    .map_err(|e| ReplayError::DecodeFailed(e.to_string()))
            }
        }
    }

    /// Import a replay exported by [`export_replay`](Self::export_replay).
    /// Returns the replay id it was stored under.
    pub fn import_replay(
        &mut self,
        data: &[u8],
        format: ReplayFormat,
    ) -> Result<String, ReplayError> {
        let json = match format {
            ReplayFormat::Json => data.to_vec(),
            ReplayFormat::Binary => {
                let mut decoder = GzDecoder::new(data);
                let mut bytes = Vec::new();
                decoder
                    .read_to_end(&mut bytes)
                    .map_err(|e| ReplayError::DecodeFailed(e.to_string()))?;
                bytes
            }
        };

        let mut recording: Recording = serde_json::from_slice(&json)
            .map_err(|e| ReplayError::DecodeFailed(e.to_string()))?;
        if recording.replay_id.is_empty() {
            recording.replay_id = new_replay_id();
        }

        let replay_id = recording.replay_id.clone();
        let size_bytes = encoded_size(&recording);
        debug!(replay_id = %replay_id, "replay imported");

        self.completed.insert(
            replay_id.clone(),
            CompletedReplay {
                recording,
                compressed: None,
                size_bytes,
            },
        );
        Ok(replay_id)
    }

    /// Delete a completed replay. True if it existed.
    pub fn delete_replay(&mut self, replay_id: &str) -> bool {
        self.completed.remove(replay_id).is_some()
    }

    /// All completed replays, newest first.
    pub fn list_replays(&self) -> Vec<ReplayOverview> {
        let mut replays: Vec<ReplayOverview> = self.completed.values().map(overview).collect();
        replays.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        replays
    }

    /// Aggregate counters.
    pub fn stats(&self) -> ReplayStats {
        ReplayStats {
            total_replays: self.completed.len(),
            active_recordings: self.active.len(),
            total_size_bytes: self.completed.values().map(|r| r.size_bytes).sum(),
        }
    }

    /// Drop abandoned active recordings older than `max_age_ms`.
    /// Completed replays are kept until explicitly deleted.
    pub fn cleanup(&mut self, max_age_ms: u64, now_ms: TimestampMs) -> usize {
        let before = self.active.len();
        self.active.retain(|_, a| {
            now_ms.saturating_sub(a.recording.metadata.started_at_ms) <= max_age_ms
        });
        before - self.active.len()
    }
}

fn overview(stored: &CompletedReplay) -> ReplayOverview {
    ReplayOverview {
        replay_id: stored.recording.replay_id.clone(),
        session_id: stored.recording.session_id.clone(),
        duration_ms: stored.recording.metadata.duration_ms,
        event_count: stored.recording.events.len(),
        frame_count: stored.recording.frames.len(),
        size_bytes: stored.size_bytes,
        compressed: stored.compressed.is_some(),
        created_at_ms: stored.recording.metadata.started_at_ms,
    }
}

fn encoded_size(recording: &Recording) -> usize {
    serde_json::to_vec(recording).map(|v| v.len()).unwrap_or(0)
}

fn compress_recording(recording: &Recording) -> String {
    let json = serde_json::to_vec(recording).expect("recording serialization cannot fail");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .expect("writing to an in-memory encoder cannot fail");
    let bytes = encoder
        .finish()
        .expect("finishing an in-memory encoder cannot fail");
    BASE64.encode(bytes)
}

fn decompress_recording(payload: &str) -> Result<Recording, ReplayError> {
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| ReplayError::DecodeFailed(e.to_string()))?;
    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| ReplayError::DecodeFailed(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| ReplayError::DecodeFailed(e.to_string()))
}

fn new_replay_id() -> String {
    format!("replay_{}", uuid::Uuid::new_v4().simple())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const T0: TimestampMs = 1_700_000_000_000;

    fn payload(label: &str) -> StateValue {
        StateValue::map_from([("label", StateValue::from(label))])
    }

    fn recorded_session(compression: bool) -> (ReplayRecorder, String) {
        let mut recorder = ReplayRecorder::new();
        recorder.start_recording(
            "s1",
            payload("meta"),
            ReplayConfig {
                compression,
                ..ReplayConfig::default()
            },
            T0,
        );

        recorder
            .record_event("s1", EventKind::Custom("ROUND_START".into()), payload("r1"), T0 + 100)
            .unwrap();
        recorder.record_frame("s1", payload("f0"), T0 + 120).unwrap();
        recorder
            .record_action("s1", "alice", "fire", payload("a1"), T0 + 350)
            .unwrap();
        recorder
            .record_event("s1", EventKind::PlayerEliminated, payload("k1"), T0 + 900)
            .unwrap();
        recorder.record_frame("s1", payload("f1"), T0 + 950).unwrap();

        let summary = recorder.stop_recording("s1", payload("stats"), T0 + 1000).unwrap();
        (recorder, summary.replay_id)
    }

    #[test]
    fn test_event_order_and_deltas() {
        let (recorder, replay_id) = recorded_session(false);
        let replay = recorder.get_replay(&replay_id).unwrap();

        assert_eq!(replay.events.len(), 3);
        // Recording order is preserved and timestamps never decrease.
        for pair in replay.events.windows(2) {
            assert!(pair[0].timestamp_ms <= pair[1].timestamp_ms);
        }
        assert_eq!(replay.events[0].delta_ms, 100);
        assert_eq!(replay.events[1].delta_ms, 250);
        assert_eq!(replay.events[2].delta_ms, 550);
    }

    #[test]
    fn test_frame_attribution() {
        let (recorder, replay_id) = recorded_session(false);
        let replay = recorder.get_replay(&replay_id).unwrap();

        assert_eq!(replay.frames.len(), 2);
        // First event landed before frame 0 existed.
        assert_eq!(replay.events[0].frame, 0);
        assert_eq!(replay.frames[0].event_count, 1);
        // Events after frame 0 attribute to frame 1.
        assert_eq!(replay.events[1].frame, 1);
        assert_eq!(replay.events[2].frame, 1);
        assert_eq!(replay.frames[1].event_count, 2);
        assert_eq!(replay.frames[1].delta_ms, 830);
    }

    #[test]
    fn test_record_action_wraps_payload() {
        let (recorder, replay_id) = recorded_session(false);
        let replay = recorder.get_replay(&replay_id).unwrap();

        let action = &replay.events[1];
        assert_eq!(action.kind, EventKind::PlayerAction);
        assert_eq!(action.data.get("player_id"), Some(&StateValue::from("alice")));
        assert_eq!(action.data.get("action"), Some(&StateValue::from("fire")));
        assert_eq!(action.data.get("label"), Some(&StateValue::from("a1")));
    }

    #[test]
    fn test_stop_finalizes_metadata_and_freezes() {
        let (mut recorder, replay_id) = recorded_session(false);
        let replay = recorder.get_replay(&replay_id).unwrap();

        assert_eq!(replay.metadata.duration_ms, Some(1000));
        assert_eq!(replay.metadata.event_count, Some(3));
        assert_eq!(replay.metadata.frame_count, Some(2));
        assert_eq!(replay.metadata.average_frame_time_ms, Some(500.0));
        assert_eq!(replay.metadata.final_stats, payload("stats"));

        // The session is no longer recording.
        assert_eq!(
            recorder.record_event("s1", EventKind::MatchWon, StateValue::Null, T0 + 2000),
            Err(ReplayError::NotRecording("s1".into()))
        );
        assert_eq!(
            recorder.stop_recording("s1", StateValue::Null, T0 + 2000),
            Err(ReplayError::NotRecording("s1".into()))
        );
    }

    #[test]
    fn test_compression_round_trip() {
        let (recorder, compressed_id) = recorded_session(true);
        let (plain_recorder, plain_id) = recorded_session(false);

        let compressed = recorder.get_replay(&compressed_id).unwrap();
        let plain = plain_recorder.get_replay(&plain_id).unwrap();

        // Decoding the compressed payload reproduces the same events
        // and frames as the uncompressed recording.
        assert_eq!(compressed.events, plain.events);
        assert_eq!(compressed.frames, plain.frames);

        assert!(recorder.replay_metadata(&compressed_id).unwrap().compressed);
        assert!(!plain_recorder.replay_metadata(&plain_id).unwrap().compressed);
    }

    #[test]
    fn test_export_import_json() {
        let (recorder, replay_id) = recorded_session(false);
        let exported = recorder.export_replay(&replay_id, ReplayFormat::Json).unwrap();

        let mut other = ReplayRecorder::new();
        let imported_id = other.import_replay(&exported, ReplayFormat::Json).unwrap();
        assert_eq!(imported_id, replay_id);
        assert_eq!(
            other.get_replay(&imported_id).unwrap(),
            recorder.get_replay(&replay_id).unwrap()
        );
    }

    #[test]
    fn test_export_import_binary() {
        let (recorder, replay_id) = recorded_session(true);
        let exported = recorder.export_replay(&replay_id, ReplayFormat::Binary).unwrap();

        let mut other = ReplayRecorder::new();
        let imported_id = other.import_replay(&exported, ReplayFormat::Binary).unwrap();
        assert_eq!(
            other.get_replay(&imported_id).unwrap(),
            recorder.get_replay(&replay_id).unwrap()
        );
    }

    #[test]
    fn test_import_garbage_fails() {
        let mut recorder = ReplayRecorder::new();
        assert!(matches!(
            recorder.import_replay(b"not a replay", ReplayFormat::Json),
            Err(ReplayError::DecodeFailed(_))
        ));
        assert!(matches!(
            recorder.import_replay(b"not gzip either", ReplayFormat::Binary),
            Err(ReplayError::DecodeFailed(_))
        ));
    }

    #[test]
    fn test_list_delete_stats() {
        let (mut recorder, replay_id) = recorded_session(false);
        recorder.start_recording("s2", StateValue::Null, ReplayConfig::default(), T0 + 5000);
        let second = recorder.stop_recording("s2", StateValue::Null, T0 + 6000).unwrap();

        let listed = recorder.list_replays();
        assert_eq!(listed.len(), 2);
        // Newest first.
        assert_eq!(listed[0].replay_id, second.replay_id);

        let stats = recorder.stats();
        assert_eq!(stats.total_replays, 2);
        assert_eq!(stats.active_recordings, 0);
        assert!(stats.total_size_bytes > 0);

        assert!(recorder.delete_replay(&replay_id));
        assert!(!recorder.delete_replay(&replay_id));
        assert_eq!(recorder.stats().total_replays, 1);
    }

    #[test]
    fn test_cleanup_drops_abandoned_recordings() {
        let mut recorder = ReplayRecorder::new();
        recorder.start_recording("dead", StateValue::Null, ReplayConfig::default(), T0);
        recorder.start_recording(
            "live",
            StateValue::Null,
            ReplayConfig::default(),
            T0 + 3_600_001,
        );

        let removed = recorder.cleanup(3_600_000, T0 + 3_600_002);
        assert_eq!(removed, 1);
        assert!(matches!(
            recorder.record_event("dead", EventKind::MatchWon, StateValue::Null, T0),
            Err(ReplayError::NotRecording(_))
        ));
        assert!(recorder
            .record_event("live", EventKind::MatchWon, StateValue::Null, T0 + 3_600_003)
            .is_ok());
    }

    #[test]
    fn test_event_kind_wire_names() {
        assert_eq!(EventKind::from_name("MATCH_WON"), EventKind::MatchWon);
        assert_eq!(
            EventKind::from_name("BOSS_PHASE"),
            EventKind::Custom("BOSS_PHASE".into())
        );
        assert_eq!(EventKind::Multikill.as_str(), "MULTIKILL");

        let json = serde_json::to_string(&EventKind::EpicMoment).unwrap();
        assert_eq!(json, "\"EPIC_MOMENT\"");
        let back: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventKind::EpicMoment);
    }
}
