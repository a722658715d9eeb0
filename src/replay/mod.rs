//! Replay Recording and Playback
//!
//! Event-sourced session recording: append-only event and frame logs,
//! lossless compression, export/import round-trips, paced playback and
//! highlight extraction.

pub mod highlights;
pub mod playback;
pub mod recorder;

pub use highlights::{generate_highlights, Highlight, HighlightCriteria};
pub use playback::{PlaybackController, PlaybackStatus, PlaybackUpdate};
pub use recorder::{
    EventKind, Recording, RecordingInfo, RecordingSummary, ReplayConfig, ReplayError,
    ReplayEvent, ReplayFormat, ReplayFrame, ReplayMetadata, ReplayOverview, ReplayRecorder,
    ReplayStats,
};
