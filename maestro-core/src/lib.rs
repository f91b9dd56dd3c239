// maestro-core/src/lib.rs

//! The core engine for real-time pitch detection and key analysis.
//! This crate buffers a live monophonic (or lightly polyphonic) audio
//! stream, extracts fundamentals from windowed FFT frames, maps them to
//! musical notes, and infers the most likely key from a recorded note
//! sequence. It is completely headless and contains no GUI code.

pub mod audio;
pub mod buffer;
pub mod detector;
pub mod engine;
pub mod fft;
pub mod key;
pub mod notes;
pub mod stability;

/// A detected musical note with frequency and magnitude information.
///
/// Published collections of detected notes are always sorted by descending
/// magnitude, so the strongest note comes first.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedNote {
    /// Note name (e.g. "A" from the range-table classifier, "A5" from the
    /// formula classifier).
    pub name: String,
    /// Detected frequency in Hz.
    pub frequency: f32,
    /// Strength of the underlying spectral peak.
    pub magnitude: f32,
    /// MIDI note number (0-127).
    pub midi_note: u8,
}
