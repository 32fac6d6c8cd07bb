//! # Spectral Analysis Module
//!
//! FFT support for the frequency estimator. The time-domain detectors
//! produce the pitch decision; this module refines their estimate to
//! sub-bin accuracy by locating the spectral peak near it.
//!
//! The forward FFT is planned once per session for the fixed analysis
//! window size, so no planner work happens on the audio path.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// How many bins around the rough estimate are searched for the peak.
const PEAK_SEARCH_RADIUS: usize = 2;

/// Removes the DC offset from a signal by centering it on zero.
///
/// A DC component shows up as a large bin at 0 Hz and skews the
/// magnitudes of the low bins we care about.
fn remove_dc_offset(signal: &mut [f32]) {
    if signal.is_empty() {
        return;
    }
    let mean = signal.iter().sum::<f32>() / signal.len() as f32;
    if mean.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= mean;
        }
    }
}

/// Applies a Hann window in place to reduce spectral leakage.
fn apply_hann_window(signal: &mut [f32]) {
    let n = signal.len();
    if n < 2 {
        return;
    }
    let step = 2.0 * std::f32::consts::PI / (n - 1) as f32;
    for (i, sample) in signal.iter_mut().enumerate() {
        *sample *= 0.5 * (1.0 - (step * i as f32).cos());
    }
}

/// Forward-FFT analyzer with a plan prepared once for a fixed window size.
pub struct SpectrumAnalyzer {
    window_size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new(window_size: usize) -> SpectrumAnalyzer {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);
        SpectrumAnalyzer { window_size, fft }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Magnitude spectrum of one analysis window, up to Nyquist.
    ///
    /// The signal is DC-centered and Hann-windowed before the transform.
    /// A window of the wrong length yields an empty spectrum, which the
    /// caller treats as "no refinement available".
    pub fn magnitudes(&self, signal: &[f32]) -> Vec<f32> {
        if signal.len() != self.window_size {
            return Vec::new();
        }

        let mut prepared = signal.to_vec();
        remove_dc_offset(&mut prepared);
        apply_hann_window(&mut prepared);

        let mut buffer: Vec<Complex<f32>> = prepared
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();
        self.fft.process(&mut buffer);

        // Real input: everything above Nyquist mirrors the lower half.
        buffer
            .iter()
            .take(self.window_size / 2)
            .map(|bin| bin.norm())
            .collect()
    }

    /// Refines a rough frequency estimate against the magnitude spectrum.
    ///
    /// Finds the strongest bin within a small radius of the estimate and
    /// interpolates a parabola through the log magnitudes of that bin and
    /// its neighbors. Returns `None` when the spectrum gives nothing to
    /// work with; the caller then keeps the rough value.
    pub fn refine_peak(
        &self,
        magnitudes: &[f32],
        rough_freq: f32,
        sample_rate: u32,
    ) -> Option<f32> {
        if magnitudes.is_empty() || rough_freq <= 0.0 || sample_rate == 0 {
            return None;
        }

        let bin_width = sample_rate as f32 / self.window_size as f32;
        let target_bin = (rough_freq / bin_width).round() as usize;
        let start = target_bin.saturating_sub(PEAK_SEARCH_RADIUS);
        let end = (target_bin + PEAK_SEARCH_RADIUS).min(magnitudes.len().saturating_sub(1));
        if start >= end {
            return None;
        }

        let mut peak_bin = start;
        for bin in start..=end {
            if magnitudes[bin] > magnitudes[peak_bin] {
                peak_bin = bin;
            }
        }
        // Interpolation needs both neighbors.
        if peak_bin == 0 || peak_bin + 1 >= magnitudes.len() {
            return None;
        }

        let left = magnitudes[peak_bin - 1].ln();
        let center = magnitudes[peak_bin].ln();
        let right = magnitudes[peak_bin + 1].ln();
        if !left.is_finite() || !center.is_finite() || !right.is_finite() {
            return None;
        }

        let denominator = 2.0 * center - left - right;
        if denominator.abs() < 1e-6 {
            return None;
        }
        let shift = (right - left) / (2.0 * denominator);
        let refined = (peak_bin as f32 + shift) * bin_width;

        if refined.is_finite() && refined > 0.0 {
            Some(refined)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44100;
    const WINDOW: usize = 4096;

    fn sine(freq: f32) -> Vec<f32> {
        (0..WINDOW)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    #[test]
    fn hann_window_tapers_edges() {
        let mut buffer = vec![1.0_f32; 64];
        apply_hann_window(&mut buffer);
        assert!(buffer[0].abs() < 1e-6);
        assert!(buffer[63].abs() < 1e-6);
        assert!((buffer[32] - 1.0).abs() < 0.01);
    }

    #[test]
    fn dc_offset_is_removed() {
        let mut buffer = vec![0.5_f32; 128];
        remove_dc_offset(&mut buffer);
        let mean: f32 = buffer.iter().sum::<f32>() / buffer.len() as f32;
        assert!(mean.abs() < 1e-6);
    }

    #[test]
    fn spectrum_peaks_at_the_signal_frequency() {
        let analyzer = SpectrumAnalyzer::new(WINDOW);
        let magnitudes = analyzer.magnitudes(&sine(440.0));
        assert_eq!(magnitudes.len(), WINDOW / 2);

        let peak_bin = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let bin_width = SAMPLE_RATE as f32 / WINDOW as f32;
        let peak_freq = peak_bin as f32 * bin_width;
        assert!((peak_freq - 440.0).abs() < bin_width);
    }

    #[test]
    fn refinement_beats_bin_resolution() {
        let analyzer = SpectrumAnalyzer::new(WINDOW);
        let magnitudes = analyzer.magnitudes(&sine(440.0));
        // Start from a deliberately coarse estimate half a bin away.
        let refined = analyzer
            .refine_peak(&magnitudes, 435.0, SAMPLE_RATE)
            .unwrap();
        assert!((refined - 440.0).abs() < 3.0);
    }

    #[test]
    fn wrong_window_length_yields_no_spectrum() {
        let analyzer = SpectrumAnalyzer::new(WINDOW);
        assert!(analyzer.magnitudes(&[0.0; 100]).is_empty());
        assert!(analyzer.refine_peak(&[], 440.0, SAMPLE_RATE).is_none());
    }
}
