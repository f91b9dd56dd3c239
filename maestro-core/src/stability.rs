//! # Note Stability Module
//!
//! Hysteresis filter for the monophonic detection path. A candidate note
//! must recur for a minimum number of consecutive analysis cycles before it
//! is published, which trades a little onset latency for rejection of
//! single-frame spectral glitches.

use crate::DetectedNote;
use std::collections::BTreeMap;

/// Per-note accumulation state.
///
/// An entry is created the cycle a candidate first appears, incremented each
/// cycle it recurs, and deleted the cycle it is absent. There is no grace
/// period: one missed frame resets accumulation for that pitch.
#[derive(Debug, Clone)]
pub struct NoteHistory {
    pub consecutive_frames: u32,
    pub total_magnitude: f32,
}

/// Tracks candidate notes across analysis cycles, keyed by MIDI number.
pub struct StabilityTracker {
    required_frames: u32,
    history: BTreeMap<u8, NoteHistory>,
}

impl StabilityTracker {
    /// Creates a tracker that confirms a note after `required_frames`
    /// consecutive appearances.
    pub fn new(required_frames: u32) -> Self {
        StabilityTracker {
            required_frames,
            history: BTreeMap::new(),
        }
    }

    /// Advances the tracker by one analysis cycle.
    ///
    /// `candidates` are this cycle's fresh detections; `confirmed` is
    /// cleared and refilled with the candidates whose history has reached
    /// the confirmation threshold, sorted by descending magnitude. The live
    /// frequency/magnitude readings come from the candidate, not the
    /// history, which only keeps the counter and running magnitude sum.
    pub fn update(&mut self, candidates: &[DetectedNote], confirmed: &mut Vec<DetectedNote>) {
        for candidate in candidates {
            self.history
                .entry(candidate.midi_note)
                .and_modify(|h| {
                    h.consecutive_frames += 1;
                    h.total_magnitude += candidate.magnitude;
                })
                .or_insert(NoteHistory {
                    consecutive_frames: 1,
                    total_magnitude: candidate.magnitude,
                });
        }

        // A note absent from this cycle loses its history immediately.
        self.history
            .retain(|midi, _| candidates.iter().any(|c| c.midi_note == *midi));

        confirmed.clear();
        for (midi, history) in &self.history {
            if history.consecutive_frames >= self.required_frames {
                if let Some(candidate) = candidates.iter().find(|c| c.midi_note == *midi) {
                    confirmed.push(candidate.clone());
                }
            }
        }
        confirmed.sort_by(|a, b| {
            b.magnitude
                .partial_cmp(&a.magnitude)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Clears all accumulated history.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}
