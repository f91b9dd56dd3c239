//! # Key Estimation Module
//!
//! Infers the most likely musical key from a recorded note sequence by
//! scale matching: every pitch class present in a candidate key's scale
//! scores the key up, every chromatic (out-of-scale) pitch class scores it
//! down, and the best of the 24 (root, mode) candidates wins.

use crate::notes::{note_to_pitch_class, pitch_class_name};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Interval templates (semitones from the root).
const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_SCALE: [u8; 7] = [0, 2, 3, 5, 7, 8, 10]; // natural minor

/// Major or natural-minor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Major => write!(f, "Major"),
            Mode::Minor => write!(f, "Minor"),
        }
    }
}

/// The winning (root, mode) pair of a key estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Root pitch class, 0-11 with C = 0.
    pub root: u8,
    pub mode: Mode,
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", pitch_class_name(self.root), self.mode)
    }
}

/// Scores one candidate key against a pitch-class histogram.
///
/// In-scale occurrences count +2 each, chromatic occurrences -1 each.
fn score_candidate(counts: &[i32; 12], root: u8, scale: &[u8; 7]) -> i32 {
    let mut in_scale = [false; 12];
    for interval in scale {
        in_scale[(root + interval) as usize % 12] = true;
    }

    let mut score = 0;
    for (pc, &count) in counts.iter().enumerate() {
        if in_scale[pc] {
            score += count * 2;
        } else {
            score -= count;
        }
    }
    score
}

/// Estimates the key of a note-label sequence.
///
/// Labels are normalized to pitch classes (octave suffixes and enharmonic
/// flat spellings are handled); unrecognized labels are skipped. Candidates
/// are evaluated roots ascending, major before minor at each root, and only
/// a strictly better score displaces the incumbent, which makes the
/// tie-break explicit and reproducible.
///
/// Returns `None` for an empty sequence.
pub fn estimate_key<S: AsRef<str>>(notes: &[S]) -> Option<KeyEstimate> {
    if notes.is_empty() {
        return None;
    }

    let mut counts = [0i32; 12];
    for note in notes {
        if let Some(pc) = note_to_pitch_class(note.as_ref()) {
            counts[pc as usize] += 1;
        }
    }

    let mut best_score = i32::MIN;
    let mut best = KeyEstimate {
        root: 0,
        mode: Mode::Major,
    };

    for root in 0..12u8 {
        let major = score_candidate(&counts, root, &MAJOR_SCALE);
        if major > best_score {
            best_score = major;
            best = KeyEstimate {
                root,
                mode: Mode::Major,
            };
        }

        let minor = score_candidate(&counts, root, &MINOR_SCALE);
        if minor > best_score {
            best_score = minor;
            best = KeyEstimate {
                root,
                mode: Mode::Minor,
            };
        }
    }

    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_major_wins_for_a_c_major_melody() {
        let notes = ["C", "E", "G", "D", "F", "A"];
        let key = estimate_key(&notes).unwrap();
        assert_eq!(key, KeyEstimate { root: 0, mode: Mode::Major });
        assert_eq!(key.to_string(), "C Major");
    }

    #[test]
    fn empty_sequence_yields_no_key() {
        let notes: [&str; 0] = [];
        assert_eq!(estimate_key(&notes), None);
    }

    #[test]
    fn minor_melody_detected() {
        // C, Eb, G, Ab, Bb: squarely C natural minor, with Eb/Ab/Bb
        // penalizing every major candidate that lacks them.
        let notes = ["C", "D#", "G", "G#", "A#"];
        let key = estimate_key(&notes).unwrap();
        assert_eq!(key, KeyEstimate { root: 0, mode: Mode::Minor });
        assert_eq!(key.to_string(), "C Minor");
    }

    #[test]
    fn full_diatonic_set_ties_resolve_to_the_major_root() {
        // All seven white keys fit both C major and A natural minor with
        // identical scores; C major is evaluated first and keeps the win.
        let notes = ["C", "D", "E", "F", "G", "A", "B"];
        let key = estimate_key(&notes).unwrap();
        assert_eq!(key, KeyEstimate { root: 0, mode: Mode::Major });
    }

    #[test]
    fn flat_spellings_count_toward_the_same_pitch_class() {
        let sharp = estimate_key(&["C#", "F", "G#"]).unwrap();
        let flat = estimate_key(&["Db", "F", "Ab"]).unwrap();
        assert_eq!(sharp, flat);
    }

    #[test]
    fn octave_suffixes_are_ignored() {
        let plain = estimate_key(&["C", "E", "G"]).unwrap();
        let suffixed = estimate_key(&["C4", "E4", "G5"]).unwrap();
        assert_eq!(plain, suffixed);
    }

    #[test]
    fn relative_keys_tie_to_the_earlier_root() {
        // G major and E natural minor share a pitch-class set, so with all
        // seven notes present the scores tie and the earlier-evaluated
        // candidate (root 4, minor) keeps the win.
        let notes = ["G", "A", "B", "C", "D", "E", "F#"];
        let key = estimate_key(&notes).unwrap();
        assert_eq!(key, KeyEstimate { root: 4, mode: Mode::Minor });
    }
}
