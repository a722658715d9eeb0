//! Highlight Extraction
//!
//! Scans a completed replay for notable events and emits a clip window
//! around each one for the presentation layer to cut.

use serde::{Deserialize, Serialize};

use crate::core::value::StateValue;
use crate::replay::recorder::{EventKind, Recording, ReplayError, ReplayRecorder};

/// Default clip window on each side of a highlight event.
pub const DEFAULT_HIGHLIGHT_WINDOW_MS: u64 = 5_000;

/// What counts as a highlight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HighlightCriteria {
    /// Event kinds that qualify.
    pub kinds: Vec<EventKind>,
    /// Clip window on each side of the event.
    pub window_ms: u64,
}

impl Default for HighlightCriteria {
    fn default() -> Self {
        Self {
            kinds: vec![
                EventKind::PlayerEliminated,
                EventKind::MatchWon,
                EventKind::AchievementUnlocked,
                EventKind::EpicMoment,
                EventKind::Comeback,
                EventKind::Multikill,
            ],
            window_ms: DEFAULT_HIGHLIGHT_WINDOW_MS,
        }
    }
}

/// A highlight descriptor: one notable event plus its clip window,
/// all offsets relative to the recording start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    /// Index into the replay's event log.
    pub event_index: usize,
    /// Kind of the highlighted event.
    pub kind: EventKind,
    /// Display caption.
    pub description: String,
    /// Offset of the event itself.
    pub timestamp_ms: u64,
    /// Clip start offset (clamped at 0).
    pub start_ms: u64,
    /// Clip end offset.
    pub end_ms: u64,
}

/// Scan a recording for highlights.
///
/// An event qualifies when its kind is listed in the criteria, or when
/// its payload carries an `is_highlight: true` flag.
pub fn generate_highlights(recording: &Recording, criteria: &HighlightCriteria) -> Vec<Highlight> {
    let start = recording.metadata.started_at_ms;

    recording
        .events
        .iter()
        .enumerate()
        .filter(|(_, event)| {
            criteria.kinds.contains(&event.kind) || flagged_as_highlight(&event.data)
        })
        .map(|(event_index, event)| {
            let offset = event.timestamp_ms.saturating_sub(start);
            Highlight {
                event_index,
                kind: event.kind.clone(),
                description: describe(&event.kind),
                timestamp_ms: offset,
                start_ms: offset.saturating_sub(criteria.window_ms),
                end_ms: offset + criteria.window_ms,
            }
        })
        .collect()
}

impl ReplayRecorder {
    /// Highlights for a completed replay.
    pub fn generate_highlights(
        &self,
        replay_id: &str,
        criteria: &HighlightCriteria,
    ) -> Result<Vec<Highlight>, ReplayError> {
        let recording = self.get_replay(replay_id)?;
        Ok(generate_highlights(&recording, criteria))
    }
}

fn flagged_as_highlight(data: &StateValue) -> bool {
    matches!(data.get("is_highlight"), Some(StateValue::Bool(true)))
}

fn describe(kind: &EventKind) -> String {
    match kind {
        EventKind::PlayerEliminated => "Player Elimination".to_string(),
        EventKind::MatchWon => "Victory!".to_string(),
        EventKind::AchievementUnlocked => "Achievement Unlocked".to_string(),
        EventKind::EpicMoment => "Epic Moment".to_string(),
        EventKind::Comeback => "Amazing Comeback".to_string(),
        EventKind::Multikill => "Multikill!".to_string(),
        other => other.as_str().to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::recorder::ReplayConfig;
    use crate::TimestampMs;

    const T0: TimestampMs = 1_700_000_000_000;

    fn recorded() -> (ReplayRecorder, String) {
        let mut recorder = ReplayRecorder::new();
        recorder.start_recording("s1", StateValue::Null, ReplayConfig::default(), T0);

        recorder
            .record_event(
                "s1",
                EventKind::Custom("ROUND_START".into()),
                StateValue::Null,
                T0 + 2_000,
            )
            .unwrap();
        recorder
            .record_event("s1", EventKind::PlayerEliminated, StateValue::Null, T0 + 30_000)
            .unwrap();
        recorder
            .record_event(
                "s1",
                EventKind::Custom("CLUTCH_PLAY".into()),
                StateValue::map_from([("is_highlight", StateValue::from(true))]),
                T0 + 45_000,
            )
            .unwrap();
        recorder
            .record_event("s1", EventKind::MatchWon, StateValue::Null, T0 + 60_000)
            .unwrap();

        let summary = recorder
            .stop_recording("s1", StateValue::Null, T0 + 61_000)
            .unwrap();
        (recorder, summary.replay_id)
    }

    #[test]
    fn test_default_criteria_windows() {
        let (recorder, replay_id) = recorded();
        let highlights = recorder
            .generate_highlights(&replay_id, &HighlightCriteria::default())
            .unwrap();

        assert_eq!(highlights.len(), 3);

        let elimination = &highlights[0];
        assert_eq!(elimination.event_index, 1);
        assert_eq!(elimination.kind, EventKind::PlayerEliminated);
        assert_eq!(elimination.description, "Player Elimination");
        assert_eq!(elimination.timestamp_ms, 30_000);
        assert_eq!(elimination.start_ms, 25_000);
        assert_eq!(elimination.end_ms, 35_000);

        // Explicitly flagged custom event is included.
        assert_eq!(highlights[1].kind, EventKind::Custom("CLUTCH_PLAY".into()));
        assert_eq!(highlights[1].description, "CLUTCH_PLAY");

        assert_eq!(highlights[2].kind, EventKind::MatchWon);
        assert_eq!(highlights[2].description, "Victory!");
    }

    #[test]
    fn test_window_clamps_at_recording_start() {
        let (recorder, replay_id) = recorded();
        let criteria = HighlightCriteria {
            kinds: vec![EventKind::Custom("ROUND_START".into())],
            window_ms: 10_000,
        };
        let highlights = recorder.generate_highlights(&replay_id, &criteria).unwrap();

        assert_eq!(highlights.len(), 2); // ROUND_START plus the flagged event
        assert_eq!(highlights[0].timestamp_ms, 2_000);
        assert_eq!(highlights[0].start_ms, 0);
        assert_eq!(highlights[0].end_ms, 12_000);
    }

    #[test]
    fn test_custom_criteria_excludes_unlisted_kinds() {
        let (recorder, replay_id) = recorded();
        let criteria = HighlightCriteria {
            kinds: vec![EventKind::MatchWon],
            window_ms: 1_000,
        };
        let highlights = recorder.generate_highlights(&replay_id, &criteria).unwrap();

        // MatchWon by kind, CLUTCH_PLAY by flag; the elimination is out.
        assert_eq!(highlights.len(), 2);
        assert!(highlights.iter().all(|h| h.kind != EventKind::PlayerEliminated));
    }
}
