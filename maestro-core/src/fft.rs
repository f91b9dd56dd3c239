//! # Spectral Analysis Module
//!
//! Windowed forward-FFT analysis of fixed-size sample frames. The analyzer
//! owns everything that can be computed once per frame size (the Hann window
//! coefficients and the RustFFT plan) plus reusable scratch storage, so a
//! single analysis cycle performs no allocation.
//!
//! ## Pipeline per frame
//! 1. DC offset removal (centers the signal around zero)
//! 2. Hann windowing to reduce spectral leakage
//! 3. Forward FFT
//! 4. Magnitude per bin: `sqrt(re² + im²) / N`

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Transforms analysis frames into magnitude spectra.
///
/// No state persists between calls except the precomputed window, the FFT
/// plan, and the scratch buffer.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Box<[f32]>,
    scratch: Vec<Complex<f32>>,
    frame_size: usize,
}

impl SpectralAnalyzer {
    /// Creates an analyzer for frames of `frame_size` samples.
    ///
    /// `frame_size` should be a power of two for transform efficiency.
    pub fn new(frame_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);

        // Hann window: w(n) = 0.5 * (1 - cos(2π * n / (N - 1)))
        let n_minus_1 = (frame_size - 1) as f32;
        let window = (0..frame_size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        SpectralAnalyzer {
            fft,
            window,
            scratch: vec![Complex::new(0.0, 0.0); frame_size],
            frame_size,
        }
    }

    /// The frame size this analyzer was planned for.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Analyzes one frame into `magnitudes` (length `frame_size / 2`).
    ///
    /// Bin `i` of the output corresponds to frequency
    /// `i * sample_rate / frame_size`.
    pub fn process(&mut self, frame: &[f32], magnitudes: &mut [f32]) {
        debug_assert_eq!(frame.len(), self.frame_size);
        debug_assert_eq!(magnitudes.len(), self.frame_size / 2);

        // Remove DC offset so bin 0 does not swamp the low end.
        let mean = frame.iter().sum::<f32>() / self.frame_size as f32;

        for (i, (&sample, slot)) in frame.iter().zip(self.scratch.iter_mut()).enumerate() {
            *slot = Complex::new((sample - mean) * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let norm = self.frame_size as f32;
        for (slot, bin) in magnitudes.iter_mut().zip(self.scratch.iter()) {
            *slot = bin.norm() / norm;
        }
    }
}
