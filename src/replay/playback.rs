//! Replay Playback
//!
//! Paced event dispatch on a cancellable scheduler task. The controller
//! and the playback task talk over channels: commands flow in, events
//! flow out, and `stop()` interrupts whatever dispatch is pending - no
//! timer outlives the controller.
//!
//! Playback is the engine's only suspension point; everything runs on a
//! caller-provided tokio runtime.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::replay::recorder::{Recording, ReplayError, ReplayEvent, ReplayRecorder};

/// Minimum playback speed.
pub const MIN_SPEED: f64 = 0.1;

/// Maximum playback speed.
pub const MAX_SPEED: f64 = 5.0;

/// Messages delivered to the playback consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackUpdate {
    /// One replay event, in recording order.
    Event {
        /// Index into the recording's event log.
        index: usize,
        /// The event itself.
        event: ReplayEvent,
    },
    /// The event log is exhausted.
    Completed,
}

/// Point-in-time playback status.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    /// Dispatch loop is running.
    pub playing: bool,
    /// Dispatch loop is suspended by `pause()`.
    pub paused: bool,
    /// Next event index to dispatch.
    pub current_index: usize,
    /// Position in the recording, milliseconds from its start.
    pub position_ms: u64,
    /// Total recording duration.
    pub duration_ms: u64,
    /// Current speed multiplier.
    pub speed: f64,
}

enum Command {
    Play,
    Pause,
    Stop,
    Seek(u64),
    SetSpeed(f64),
}

/// Handle to a playback task.
///
/// Dropping the controller closes the command channel, which terminates
/// the task and cancels any pending dispatch.
pub struct PlaybackController {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<Mutex<PlaybackStatus>>,
    handle: JoinHandle<()>,
}

impl PlaybackController {
    /// Start (or resume) dispatching events.
    pub fn play(&self) {
        let _ = self.commands.send(Command::Play);
    }

    /// Suspend dispatching, keeping the position.
    pub fn pause(&self) {
        let _ = self.commands.send(Command::Pause);
    }

    /// Stop playback, cancel the pending dispatch and rewind to the
    /// start.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    /// Jump to the first event at or after `position_ms` from the
    /// recording start.
    pub fn seek(&self, position_ms: u64) {
        let _ = self.commands.send(Command::Seek(position_ms));
    }

    /// Set the speed multiplier, clamped to `[0.1, 5.0]`.
    pub fn set_speed(&self, speed: f64) {
        let _ = self.commands.send(Command::SetSpeed(speed));
    }

    /// Current status snapshot.
    pub fn status(&self) -> PlaybackStatus {
        *self.status.lock().expect("status lock poisoned")
    }

    /// Wait for the playback task to terminate.
    pub async fn finished(self) {
        let _ = self.handle.await;
    }
}

impl ReplayRecorder {
    /// Start a playback task over a completed replay.
    ///
    /// Returns the controller and the update stream. The task starts
    /// idle; call [`PlaybackController::play`] to begin dispatching.
    /// Must be called within a tokio runtime.
    pub fn play_replay(
        &self,
        replay_id: &str,
        speed: f64,
    ) -> Result<(PlaybackController, mpsc::UnboundedReceiver<PlaybackUpdate>), ReplayError> {
        let recording = self.get_replay(replay_id)?;
        Ok(spawn_playback(recording, speed))
    }
}

/// Spawn the scheduler task for a recording.
pub fn spawn_playback(
    recording: Recording,
    speed: f64,
) -> (PlaybackController, mpsc::UnboundedReceiver<PlaybackUpdate>) {
    let duration_ms = recording
        .metadata
        .duration_ms
        .or_else(|| {
            recording
                .events
                .last()
                .map(|e| e.timestamp_ms.saturating_sub(recording.metadata.started_at_ms))
        })
        .unwrap_or(0);

    let status = Arc::new(Mutex::new(PlaybackStatus {
        playing: false,
        paused: false,
        current_index: 0,
        position_ms: 0,
        duration_ms,
        speed: speed.clamp(MIN_SPEED, MAX_SPEED),
    }));

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    let task_status = Arc::clone(&status);
    let handle = tokio::spawn(run_playback(recording, command_rx, update_tx, task_status));

    (
        PlaybackController {
            commands: command_tx,
            status,
            handle,
        },
        update_rx,
    )
}

async fn run_playback(
    recording: Recording,
    mut commands: mpsc::UnboundedReceiver<Command>,
    updates: mpsc::UnboundedSender<PlaybackUpdate>,
    status: Arc<Mutex<PlaybackStatus>>,
) {
    let started_at = recording.metadata.started_at_ms;
    let events = recording.events;

    loop {
        let snapshot = *status.lock().expect("status lock poisoned");

        let command = if snapshot.playing && !snapshot.paused {
            if snapshot.current_index >= events.len() {
                let _ = updates.send(PlaybackUpdate::Completed);
                set_status(&status, |s| {
                    s.playing = false;
                    s.paused = false;
                });
                debug!("playback complete");
                match commands.recv().await {
                    Some(command) => command,
                    None => return,
                }
            } else {
                let event = &events[snapshot.current_index];
                let delay_ms = (event.delta_ms as f64 / snapshot.speed).round() as u64;
                let sleep = tokio::time::sleep(std::time::Duration::from_millis(delay_ms));

                tokio::select! {
                    command = commands.recv() => match command {
                        Some(command) => command,
                        None => return,
                    },
                    _ = sleep => {
                        let index = snapshot.current_index;
                        let dispatched = updates.send(PlaybackUpdate::Event {
                            index,
                            event: event.clone(),
                        });
                        if dispatched.is_err() {
                            // Consumer is gone; nothing left to pace.
                            return;
                        }
                        set_status(&status, |s| {
                            s.current_index = index + 1;
                            s.position_ms = event.timestamp_ms.saturating_sub(started_at);
                        });
                        continue;
                    }
                }
            }
        } else {
            match commands.recv().await {
                Some(command) => command,
                None => return,
            }
        };

        match command {
            Command::Play => set_status(&status, |s| {
                s.playing = true;
                s.paused = false;
            }),
            Command::Pause => set_status(&status, |s| {
                s.paused = true;
            }),
            Command::Stop => set_status(&status, |s| {
                s.playing = false;
                s.paused = false;
                s.current_index = 0;
                s.position_ms = 0;
            }),
            Command::Seek(position_ms) => {
                let index = events
                    .iter()
                    .position(|e| e.timestamp_ms.saturating_sub(started_at) >= position_ms)
                    .unwrap_or(events.len());
                set_status(&status, |s| {
                    s.current_index = index;
                    s.position_ms = position_ms;
                });
            }
            Command::SetSpeed(speed) => set_status(&status, |s| {
                s.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
            }),
        }
    }
}

fn set_status<F: FnOnce(&mut PlaybackStatus)>(status: &Arc<Mutex<PlaybackStatus>>, apply: F) {
    let mut guard = status.lock().expect("status lock poisoned");
    apply(&mut guard);
}

// =============================================================================
// TESTS
// =============================================================================
