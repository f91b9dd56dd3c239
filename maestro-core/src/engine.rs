//! # Engine Module
//!
//! The boundary between the time-critical producer context and everything
//! else. The [`Engine`] is owned by the producer (the audio callback or a
//! worker thread fed by it) and drives the [`PitchDetector`]; an
//! [`EngineHandle`] can be cloned off for the display and recording-control
//! contexts.
//!
//! Hand-off rules:
//! - Detected notes are published as a snapshot copy under a mutex held for
//!   O(notes) time (at most the polyphony limit), so a polling reader never
//!   observes the producer's working state.
//! - The recorded note sequence is guarded by its own mutex, shared between
//!   the producer's append (a single compare-and-push) and the recording
//!   controller.

use crate::DetectedNote;
use crate::detector::{DetectorConfig, PitchDetector};
use crate::key;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A finished (or in-progress) recording: the duplicate-collapsed note
/// sequence and the key label derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSession {
    pub notes: Vec<String>,
    pub detected_key: String,
}

#[derive(Default)]
struct SessionState {
    recorded_notes: Vec<String>,
    last_recorded: String,
    detected_key: String,
}

struct SharedState {
    notes: Mutex<Vec<DetectedNote>>,
    active: AtomicBool,
    recording: AtomicBool,
    session: Mutex<SessionState>,
}

/// Producer-side engine: feeds blocks, publishes results.
pub struct Engine {
    detector: PitchDetector,
    shared: Arc<SharedState>,
}

impl Engine {
    pub fn new(config: DetectorConfig) -> Self {
        Engine {
            detector: PitchDetector::new(config),
            shared: Arc::new(SharedState {
                notes: Mutex::new(Vec::new()),
                active: AtomicBool::new(false),
                recording: AtomicBool::new(false),
                session: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Clones off a handle for the polling and recording-control contexts.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// (Re)initializes for a stream configuration; must precede submission.
    pub fn prepare(&mut self, sample_rate: f32, expected_block_size: usize) {
        self.detector.prepare(sample_rate, expected_block_size);
        self.publish();
    }

    /// Feeds one block and publishes the resulting state.
    ///
    /// Runs zero or one analysis cycle depending on buffer fill. While a
    /// recording is active, the strongest published note is appended to the
    /// session unless it repeats the previously recorded label.
    pub fn submit_block(&mut self, samples: &[f32]) {
        self.detector.process_block(samples);
        self.publish();

        if self.shared.recording.load(Ordering::Relaxed) {
            if let Some(strongest) = self.detector.detected_notes().first() {
                let mut session = self
                    .shared
                    .session
                    .lock()
                    .unwrap_or_else(|e| e.into_inner());
                if strongest.name != session.last_recorded {
                    session.last_recorded = strongest.name.clone();
                    let name = session.last_recorded.clone();
                    session.recorded_notes.push(name);
                }
            }
        }
    }

    fn publish(&self) {
        self.shared
            .active
            .store(self.detector.is_active(), Ordering::Relaxed);
        let mut notes = self
            .shared
            .notes
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        notes.clear();
        notes.extend_from_slice(self.detector.detected_notes());
    }

    /// Sets the minimum peak magnitude, clamped to `[0, 1]`.
    pub fn set_magnitude_threshold(&mut self, threshold: f32) {
        self.detector.set_magnitude_threshold(threshold);
    }

    /// Sets the RMS silence floor, clamped to `[0, 1]`.
    pub fn set_noise_gate_threshold(&mut self, threshold: f32) {
        self.detector.set_noise_gate_threshold(threshold);
    }

    /// Zeroes all buffers, history, and published state.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.publish();
    }
}

/// Cloneable read/control handle onto a running [`Engine`].
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<SharedState>,
}

impl EngineHandle {
    /// Snapshot of the currently detected notes, sorted by descending
    /// magnitude. Safe to call concurrently with block submission.
    pub fn detected_notes(&self) -> Vec<DetectedNote> {
        self.shared
            .notes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether the last submitted block passed the noise gate.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Relaxed)
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::Relaxed)
    }

    /// Starts a recording session, discarding any previous one.
    pub fn start_recording(&self) {
        let mut session = self
            .shared
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        session.recorded_notes.clear();
        session.last_recorded.clear();
        session.detected_key.clear();
        self.shared.recording.store(true, Ordering::Relaxed);
    }

    /// Stops recording, runs key estimation over the captured sequence, and
    /// returns the sequence.
    pub fn stop_recording(&self) -> Vec<String> {
        self.shared.recording.store(false, Ordering::Relaxed);

        let mut session = self
            .shared
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        session.detected_key = match key::estimate_key(&session.recorded_notes) {
            Some(estimate) => estimate.to_string(),
            None => "No notes recorded".to_string(),
        };
        session.recorded_notes.clone()
    }

    /// Human-readable key label from the last completed recording.
    pub fn detected_key(&self) -> String {
        self.shared
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .detected_key
            .clone()
    }

    /// Snapshot of the recording session for persistence.
    pub fn session(&self) -> RecordingSession {
        let session = self
            .shared
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        RecordingSession {
            notes: session.recorded_notes.clone(),
            detected_key: session.detected_key.clone(),
        }
    }
}
