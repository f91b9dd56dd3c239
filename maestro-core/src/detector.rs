//! # Pitch Detection Module
//!
//! The per-block analysis pipeline: noise gate, sample accumulation,
//! spectral analysis, peak extraction, and note classification. Everything
//! here runs synchronously inside the producer's block delivery with
//! pre-sized buffers, so a call does bounded work and the hot path performs
//! no allocation beyond note labels.
//!
//! Two interchangeable extraction policies are selected at construction:
//! - [`DetectionPolicy::MultiPeak`] — up to four simultaneous notes,
//!   harmonic-filtered so overtones do not masquerade as fundamentals.
//! - [`DetectionPolicy::StrongestBin`] — a single note, confirmed by the
//!   stability tracker before it is published.

use crate::DetectedNote;
use crate::buffer::SampleFifo;
use crate::fft::SpectralAnalyzer;
use crate::notes::{NoteClassifier, NoteRangeTable};
use crate::stability::StabilityTracker;

/// FFT order; frame size is `1 << FFT_ORDER`.
pub const FFT_ORDER: usize = 11;
/// Analysis frame size in samples (2048).
pub const FRAME_SIZE: usize = 1 << FFT_ORDER;
/// Maximum simultaneous notes in multi-peak mode.
pub const MAX_POLYPHONY: usize = 4;

/// Peak/fundamental extraction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPolicy {
    /// Multi-note detection with harmonic rejection; publishes directly.
    MultiPeak,
    /// Single strongest-bin detection; publishes through the stability
    /// tracker.
    StrongestBin,
}

/// Detector construction parameters.
///
/// The harmonic tolerance and relative-magnitude floor are empirically
/// chosen defaults, kept as fields rather than constants so they can be
/// tuned per instrument.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub policy: DetectionPolicy,
    pub classifier: NoteClassifier,
    /// Minimum spectral magnitude for a peak to be considered (0..1).
    pub magnitude_threshold: f32,
    /// RMS floor below which a block is treated as silence (0..1).
    pub noise_gate_threshold: f32,
    /// Relative tolerance when testing a peak against 2x/3x/4x of an
    /// accepted lower fundamental.
    pub harmonic_tolerance: f32,
    /// Notes weaker than this fraction of the strongest note are pruned.
    pub relative_magnitude_floor: f32,
    pub max_polyphony: usize,
    /// Consecutive frames required before the stability tracker confirms a
    /// note (strongest-bin policy only).
    pub stability_frames: u32,
}

impl DetectorConfig {
    /// Multi-note configuration: formula classifier, octave-suffixed labels.
    pub fn multi_peak() -> Self {
        DetectorConfig {
            policy: DetectionPolicy::MultiPeak,
            classifier: NoteClassifier::Formula,
            ..Self::strongest_bin()
        }
    }

    /// Monophonic configuration: range-table classifier, stability-gated.
    pub fn strongest_bin() -> Self {
        DetectorConfig {
            policy: DetectionPolicy::StrongestBin,
            classifier: NoteClassifier::RangeTable(NoteRangeTable::default()),
            magnitude_threshold: 0.02,
            noise_gate_threshold: 0.001,
            harmonic_tolerance: 0.10,
            relative_magnitude_floor: 0.40,
            max_polyphony: MAX_POLYPHONY,
            stability_frames: 2,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::strongest_bin()
    }
}

/// Real-time pitch detector operating on host-delivered sample blocks.
pub struct PitchDetector {
    config: DetectorConfig,
    sample_rate: f32,
    expected_block_size: usize,

    fifo: SampleFifo,
    analyzer: SpectralAnalyzer,
    frame: Box<[f32]>,
    magnitudes: Box<[f32]>,

    // Scratch for the multi-peak policy, reused across cycles.
    peaks: Vec<(usize, f32)>,
    fundamentals: Vec<(usize, f32)>,

    candidates: Vec<DetectedNote>,
    detected: Vec<DetectedNote>,
    tracker: StabilityTracker,
    active: bool,
}

impl PitchDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let tracker = StabilityTracker::new(config.stability_frames);
        PitchDetector {
            config,
            sample_rate: 44100.0,
            expected_block_size: 512,
            fifo: SampleFifo::new(FRAME_SIZE),
            analyzer: SpectralAnalyzer::new(FRAME_SIZE),
            frame: vec![0.0; FRAME_SIZE].into_boxed_slice(),
            magnitudes: vec![0.0; FRAME_SIZE / 2].into_boxed_slice(),
            peaks: Vec::with_capacity(64),
            fundamentals: Vec::with_capacity(MAX_POLYPHONY),
            candidates: Vec::with_capacity(MAX_POLYPHONY),
            detected: Vec::with_capacity(MAX_POLYPHONY),
            tracker,
            active: false,
        }
    }

    /// (Re)initializes for a stream configuration. Must be called before
    /// block submission and may be called again on reconfiguration.
    pub fn prepare(&mut self, sample_rate: f32, expected_block_size: usize) {
        self.sample_rate = sample_rate;
        self.expected_block_size = expected_block_size;
        self.reset();
    }

    /// Feeds one host block, running at most one analysis cycle.
    ///
    /// Empty blocks are a no-op. A block below the noise-gate floor marks
    /// the detector inactive, clears the published notes, and skips
    /// buffering entirely.
    pub fn process_block(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let rms = calculate_rms(samples);
        if rms < self.config.noise_gate_threshold {
            self.active = false;
            self.detected.clear();
            return;
        }
        self.active = true;

        self.fifo.push(samples);
        if self.fifo.available() >= FRAME_SIZE {
            self.analyze();
        }
    }

    fn analyze(&mut self) {
        if !self.fifo.read_frame(&mut self.frame) {
            return;
        }
        self.analyzer.process(&self.frame, &mut self.magnitudes);

        self.candidates.clear();
        match self.config.policy {
            DetectionPolicy::MultiPeak => {
                self.extract_multi_peak();
                self.detected.clear();
                self.detected.extend(self.candidates.iter().cloned());
                self.detected.sort_by(|a, b| {
                    b.magnitude
                        .partial_cmp(&a.magnitude)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                prune_below_relative_floor(
                    &mut self.detected,
                    self.config.relative_magnitude_floor,
                );
            }
            DetectionPolicy::StrongestBin => {
                self.extract_strongest_bin();
                let candidates = std::mem::take(&mut self.candidates);
                self.tracker.update(&candidates, &mut self.detected);
                self.candidates = candidates;
            }
        }
    }

    /// Multi-note extraction with greedy harmonic rejection.
    fn extract_multi_peak(&mut self) {
        let half = FRAME_SIZE / 2;
        let mags = &self.magnitudes;

        // Strict local maxima above threshold; bins below 4 are DC and
        // sub-audio rumble.
        self.peaks.clear();
        for bin in 4..half - 1 {
            let m = mags[bin];
            if m > self.config.magnitude_threshold && m > mags[bin - 1] && m > mags[bin + 1] {
                self.peaks.push((bin, m));
            }
        }

        // Keep the strongest K, then walk them lowest-frequency first so
        // fundamentals are accepted before their overtones.
        self.peaks.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
        });
        self.peaks.truncate(self.config.max_polyphony);
        self.peaks.sort_by_key(|&(bin, _)| bin);

        self.fundamentals.clear();
        for &(bin, magnitude) in &self.peaks {
            let freq = bin as f32 * self.sample_rate / FRAME_SIZE as f32;
            let is_harmonic = self.fundamentals.iter().any(|&(accepted_bin, _)| {
                let base = accepted_bin as f32 * self.sample_rate / FRAME_SIZE as f32;
                (2..=4).any(|h| {
                    let target = h as f32 * base;
                    (freq - target).abs() <= self.config.harmonic_tolerance * target
                })
            });
            if !is_harmonic {
                self.fundamentals.push((bin, magnitude));
            }
        }

        for &(bin, magnitude) in &self.fundamentals {
            if self.candidates.len() >= self.config.max_polyphony {
                break;
            }
            let refined = parabolic_interpolation(mags, bin);
            let frequency = refined * self.sample_rate / FRAME_SIZE as f32;
            if let Some(note) = self.config.classifier.classify(frequency) {
                self.candidates.push(DetectedNote {
                    name: note.label,
                    frequency,
                    magnitude,
                    midi_note: note.midi,
                });
            }
        }
    }

    /// Monophonic extraction: the single strongest bin, gated by magnitude.
    fn extract_strongest_bin(&mut self) {
        let half = FRAME_SIZE / 2;
        let mags = &self.magnitudes;

        // Skip bins 0-1 (DC and very low frequency noise). Bin 2 is ~43 Hz
        // at 44.1 kHz, low E on a bass guitar.
        let mut strongest_bin = 2;
        let mut strongest_magnitude = mags[2];
        for (bin, &m) in mags.iter().enumerate().take(half).skip(3) {
            if m > strongest_magnitude {
                strongest_magnitude = m;
                strongest_bin = bin;
            }
        }

        if strongest_magnitude <= self.config.magnitude_threshold {
            return;
        }

        let refined = parabolic_interpolation(mags, strongest_bin);
        let frequency = refined * self.sample_rate / FRAME_SIZE as f32;
        if let Some(note) = self.config.classifier.classify(frequency) {
            self.candidates.push(DetectedNote {
                name: note.label,
                frequency,
                magnitude: strongest_magnitude,
                midi_note: note.midi,
            });
        }
    }

    /// Currently published notes, sorted by descending magnitude.
    pub fn detected_notes(&self) -> &[DetectedNote] {
        &self.detected
    }

    /// Whether the last block passed the noise gate.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn expected_block_size(&self) -> usize {
        self.expected_block_size
    }

    /// Sets the minimum peak magnitude, clamped to `[0, 1]`.
    pub fn set_magnitude_threshold(&mut self, threshold: f32) {
        self.config.magnitude_threshold = threshold.clamp(0.0, 1.0);
    }

    /// Sets the RMS silence floor, clamped to `[0, 1]`.
    pub fn set_noise_gate_threshold(&mut self, threshold: f32) {
        self.config.noise_gate_threshold = threshold.clamp(0.0, 1.0);
    }

    /// Zeroes all buffers, history, and published state.
    pub fn reset(&mut self) {
        self.fifo.reset();
        self.frame.fill(0.0);
        self.magnitudes.fill(0.0);
        self.peaks.clear();
        self.fundamentals.clear();
        self.candidates.clear();
        self.detected.clear();
        self.tracker.reset();
        self.active = false;
    }
}

/// RMS level of a block: `sqrt(mean(sample²))`.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_of_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_of_squares / samples.len() as f32).sqrt()
}

/// Refines a peak bin to sub-bin accuracy by fitting a parabola through the
/// bin and its immediate neighbors.
///
/// Falls back to the raw bin at the spectrum edges or when the denominator
/// is too close to zero for a stable fit.
fn parabolic_interpolation(magnitudes: &[f32], bin: usize) -> f32 {
    if bin == 0 || bin + 1 >= magnitudes.len() {
        return bin as f32;
    }
    let left = magnitudes[bin - 1];
    let center = magnitudes[bin];
    let right = magnitudes[bin + 1];

    let denominator = left - 2.0 * center + right;
    if denominator.abs() > 1e-4 {
        bin as f32 + 0.5 * (left - right) / denominator
    } else {
        bin as f32
    }
}

/// Drops notes whose magnitude falls below `floor` times the strongest
/// note's magnitude. Expects `notes` sorted by descending magnitude.
fn prune_below_relative_floor(notes: &mut Vec<DetectedNote>, floor: f32) {
    if let Some(strongest) = notes.first().map(|n| n.magnitude) {
        notes.retain(|n| n.magnitude >= floor * strongest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| amplitude * (2.0 * std::f32::consts::PI * freq * n as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    fn two_tone(f1: f32, a1: f32, f2: f32, a2: f32, len: usize) -> Vec<f32> {
        let omega = 2.0 * std::f32::consts::PI / SAMPLE_RATE;
        (0..len)
            .map(|n| {
                a1 * (omega * f1 * n as f32).sin() + a2 * (omega * f2 * n as f32).sin()
            })
            .collect()
    }

    fn prepared(config: DetectorConfig) -> PitchDetector {
        let mut detector = PitchDetector::new(config);
        detector.prepare(SAMPLE_RATE, 512);
        detector
    }

    #[test]
    fn sine_is_published_after_stabilization_frames() {
        let mut detector = prepared(DetectorConfig::strongest_bin());
        let signal = sine(440.0, 1.0, 2 * FRAME_SIZE);

        detector.process_block(&signal[..FRAME_SIZE]);
        // One frame is not enough for the stability tracker.
        assert!(detector.detected_notes().is_empty());

        detector.process_block(&signal[FRAME_SIZE..]);
        let notes = detector.detected_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].midi_note, 69);
        assert_eq!(notes[0].name, "A");
        assert!((notes[0].frequency - 440.0).abs() < 10.0);
        assert!(detector.is_active());
    }

    #[test]
    fn note_change_restarts_stabilization() {
        let mut detector = prepared(DetectorConfig::strongest_bin());
        let a4 = sine(440.0, 1.0, FRAME_SIZE);
        let a5 = sine(880.0, 1.0, FRAME_SIZE);

        detector.process_block(&a4);
        detector.process_block(&a5);
        // The 440 Hz entry was dropped, the 880 Hz entry is one frame old.
        assert!(detector.detected_notes().is_empty());

        detector.process_block(&a5);
        assert_eq!(detector.detected_notes().len(), 1);
        assert_eq!(detector.detected_notes()[0].midi_note, 81);
    }

    #[test]
    fn noise_gate_clears_output_and_deactivates() {
        let mut detector = prepared(DetectorConfig::strongest_bin());
        let signal = sine(440.0, 1.0, 2 * FRAME_SIZE);
        detector.process_block(&signal[..FRAME_SIZE]);
        detector.process_block(&signal[FRAME_SIZE..]);
        assert!(!detector.detected_notes().is_empty());

        // Below the 0.001 RMS floor regardless of spectral content.
        detector.process_block(&vec![0.0001; FRAME_SIZE]);
        assert!(!detector.is_active());
        assert!(detector.detected_notes().is_empty());
    }

    #[test]
    fn harmonic_is_filtered_in_multi_peak_mode() {
        let mut detector = prepared(DetectorConfig::multi_peak());
        // Equal-amplitude fundamental and second harmonic.
        let signal = two_tone(220.0, 0.5, 440.0, 0.5, FRAME_SIZE);
        detector.process_block(&signal);

        let notes = detector.detected_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].midi_note, 57);
        assert!((notes[0].frequency - 220.0).abs() < 10.0);
    }

    #[test]
    fn unrelated_tones_both_survive_multi_peak() {
        let mut detector = prepared(DetectorConfig::multi_peak());
        // A3 + E4: a fifth apart, neither a 2x/3x/4x multiple of the other.
        let signal = two_tone(220.0, 0.6, 330.0, 0.5, FRAME_SIZE);
        detector.process_block(&signal);

        let notes = detector.detected_notes();
        assert_eq!(notes.len(), 2);
        // Ordering invariant: descending magnitude.
        assert!(notes[0].magnitude >= notes[1].magnitude);
        assert_eq!(notes[0].midi_note, 57);
        assert_eq!(notes[1].midi_note, 64);
    }

    #[test]
    fn relative_floor_prunes_weak_notes() {
        let note = |midi: u8, magnitude: f32| DetectedNote {
            name: crate::notes::midi_note_name(midi),
            frequency: crate::notes::midi_to_frequency(midi),
            magnitude,
            midi_note: midi,
        };
        let mut notes = vec![note(60, 1.0), note(64, 0.5), note(67, 0.3)];
        prune_below_relative_floor(&mut notes, 0.40);

        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.magnitude >= 0.4));
    }

    #[test]
    fn interpolation_falls_back_on_flat_spectra() {
        let flat = [0.5, 0.5, 0.5, 0.5, 0.5];
        assert_eq!(parabolic_interpolation(&flat, 2), 2.0);
        // Edges use the raw bin.
        assert_eq!(parabolic_interpolation(&flat, 0), 0.0);
        assert_eq!(parabolic_interpolation(&flat, 4), 4.0);
    }

    #[test]
    fn thresholds_are_clamped() {
        let mut detector = prepared(DetectorConfig::strongest_bin());
        detector.set_magnitude_threshold(5.0);
        detector.set_noise_gate_threshold(-1.0);
        assert_eq!(detector.config().magnitude_threshold, 1.0);
        assert_eq!(detector.config().noise_gate_threshold, 0.0);
    }

    #[test]
    fn empty_block_is_a_no_op() {
        let mut detector = prepared(DetectorConfig::strongest_bin());
        detector.process_block(&[]);
        assert!(!detector.is_active());
        assert!(detector.detected_notes().is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut detector = prepared(DetectorConfig::strongest_bin());
        let signal = sine(440.0, 1.0, 2 * FRAME_SIZE);
        detector.process_block(&signal[..FRAME_SIZE]);
        detector.process_block(&signal[FRAME_SIZE..]);
        assert!(!detector.detected_notes().is_empty());

        detector.reset();
        assert!(detector.detected_notes().is_empty());
        assert!(!detector.is_active());
    }

    #[test]
    fn rms_of_known_signals() {
        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_rms(&[0.0; 64]), 0.0);
        let rms = calculate_rms(&sine(440.0, 1.0, FRAME_SIZE));
        assert!((rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01);
    }
}
