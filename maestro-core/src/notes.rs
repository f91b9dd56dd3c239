//! # Note Mapping Module
//!
//! Conversions between frequencies, MIDI note numbers, note names, and pitch
//! classes, based on equal temperament with A4 = 440 Hz.
//!
//! Two interchangeable classification strategies are provided:
//! - [`NoteClassifier::Formula`] — the continuous logarithmic formula
//!   `midi = round(69 + 12 * log2(freq / 440))`, labels carry an octave
//!   suffix (e.g. "A5").
//! - [`NoteClassifier::RangeTable`] — a precomputed table of frequency
//!   ranges whose boundaries are the geometric means between semitone
//!   neighbors, labels without octave (e.g. "A").

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Chromatic note names, C-rooted, sharps only.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Static map from note spelling to pitch class, including flat spellings
/// so that e.g. both "C#" and "Db" normalize to 1.
static PITCH_CLASSES: Lazy<BTreeMap<&'static str, u8>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    for (pc, name) in NOTE_NAMES.iter().enumerate() {
        map.insert(*name, pc as u8);
    }
    for (name, pc) in [("Db", 1), ("Eb", 3), ("Gb", 6), ("Ab", 8), ("Bb", 10)] {
        map.insert(name, pc);
    }
    map
});

/// Converts a MIDI note number to its equal-temperament frequency.
///
/// Formula: `frequency = 440 * 2^((midi - 69) / 12)`
pub fn midi_to_frequency(midi: u8) -> f32 {
    440.0 * 2.0_f32.powf((midi as f32 - 69.0) / 12.0)
}

/// Converts a frequency to the nearest MIDI note number.
///
/// Returns `None` for non-positive frequencies or results outside the MIDI
/// range `[0, 127]`.
pub fn frequency_to_midi(frequency: f32) -> Option<u8> {
    if frequency <= 0.0 {
        return None;
    }
    let midi = (69.0 + 12.0 * (frequency / 440.0).log2()).round();
    if (0.0..=127.0).contains(&midi) {
        Some(midi as u8)
    } else {
        None
    }
}

/// Note name for a MIDI number with its octave suffix (e.g. `69` -> "A5",
/// octave = `midi / 12`).
pub fn midi_note_name(midi: u8) -> String {
    format!("{}{}", NOTE_NAMES[midi as usize % 12], midi / 12)
}

/// Note name for a pitch class 0-11 (no octave).
pub fn pitch_class_name(pitch_class: u8) -> &'static str {
    NOTE_NAMES[pitch_class as usize % 12]
}

/// Normalizes a note label to a pitch class 0-11 (C = 0).
///
/// A trailing octave suffix is ignored ("C#4" -> 1) and enharmonic flat
/// spellings map to the same class as their sharp equivalents. Returns
/// `None` for labels that name no note.
pub fn note_to_pitch_class(label: &str) -> Option<u8> {
    let name = label.trim_end_matches(|c: char| c.is_ascii_digit());
    PITCH_CLASSES.get(name).copied()
}

//==============================================================================

/// One entry of the range-table classifier.
///
/// `min_hz`/`max_hz` are the geometric means between this note and its
/// semitone neighbors, so adjacent ranges tile the spectrum with no gaps or
/// overlaps.
#[derive(Debug, Clone)]
pub struct NoteRange {
    pub midi: u8,
    pub label: String,
    pub center_hz: f32,
    pub min_hz: f32,
    pub max_hz: f32,
}

/// Precomputed note-frequency ranges over a bounded MIDI span.
///
/// The default span is MIDI 24..=96 (roughly C1-C7), covering bass guitars
/// (low E at 41 Hz), pianos, and most melodic instruments.
#[derive(Debug, Clone)]
pub struct NoteRangeTable {
    ranges: Vec<NoteRange>,
}

impl NoteRangeTable {
    /// Builds ranges for every MIDI note in `low_midi..=high_midi`.
    ///
    /// Both bounds need a semitone neighbor, so the span must stay within
    /// `1..=126`.
    pub fn new(low_midi: u8, high_midi: u8) -> Self {
        debug_assert!(low_midi >= 1 && high_midi <= 126 && low_midi <= high_midi);
        let mut ranges = Vec::with_capacity((high_midi - low_midi + 1) as usize);
        for midi in low_midi..=high_midi {
            let center = midi_to_frequency(midi);
            let lower = midi_to_frequency(midi - 1);
            let upper = midi_to_frequency(midi + 1);
            ranges.push(NoteRange {
                midi,
                label: pitch_class_name(midi % 12).to_string(),
                center_hz: center,
                min_hz: (lower * center).sqrt(),
                max_hz: (center * upper).sqrt(),
            });
        }
        NoteRangeTable { ranges }
    }

    /// Finds the range containing `frequency`, half-open `[min, max)`.
    ///
    /// Returns `None` when the frequency falls outside the table entirely.
    pub fn find(&self, frequency: f32) -> Option<&NoteRange> {
        self.ranges
            .iter()
            .find(|r| frequency >= r.min_hz && frequency < r.max_hz)
    }

    pub fn ranges(&self) -> &[NoteRange] {
        &self.ranges
    }
}

impl Default for NoteRangeTable {
    fn default() -> Self {
        NoteRangeTable::new(24, 96)
    }
}

//==============================================================================

/// A classified frequency: the note identity the classifier settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedNote {
    pub midi: u8,
    pub label: String,
}

/// Frequency-to-note classification strategy, chosen at construction.
#[derive(Debug, Clone)]
pub enum NoteClassifier {
    /// Continuous logarithmic formula over the full MIDI range.
    Formula,
    /// Discrete lookup in a precomputed frequency-range table.
    RangeTable(NoteRangeTable),
}

impl NoteClassifier {
    /// Maps a frequency to a note identity, or `None` when the frequency
    /// falls outside the strategy's range.
    pub fn classify(&self, frequency: f32) -> Option<ClassifiedNote> {
        match self {
            NoteClassifier::Formula => {
                let midi = frequency_to_midi(frequency)?;
                Some(ClassifiedNote {
                    midi,
                    label: midi_note_name(midi),
                })
            }
            NoteClassifier::RangeTable(table) => {
                let range = table.find(frequency)?;
                Some(ClassifiedNote {
                    midi: range.midi,
                    label: range.label.clone(),
                })
            }
        }
    }
}
