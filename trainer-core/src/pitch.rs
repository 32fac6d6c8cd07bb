//! # Pitch Detection Module
//!
//! Estimates the fundamental frequency of one analysis window of guitar
//! audio. Detection runs as an ordered list of strategies: a YIN detector
//! first (accurate in the mid and high range of the instrument), then a
//! normalized-autocorrelation fallback that is harder to fool on the low
//! strings. Both are gated behind a signal-energy check so silence and
//! room noise never reach a detector.
//!
//! ## Features
//! - YIN with cumulative mean normalization, valley walking, and clarity
//!   rejection of noise
//! - Autocorrelation fallback with subharmonic correction for low notes
//! - RMS and peak amplitude gating
//! - Sub-sample accuracy via parabolic interpolation, polished against the
//!   magnitude spectrum

use crate::spectral::SpectrumAnalyzer;

/// Samples per analysis window.
///
/// At 44.1 kHz this is ~93 ms and holds at least four full periods of the
/// 60 Hz lower detection bound, comfortably more of the guitar's low E.
pub const ANALYSIS_WINDOW: usize = 4096;

/// Lower bound of accepted fundamentals, safely below the low E string
/// (82.41 Hz).
pub const MIN_FREQUENCY: f32 = 60.0;

/// Upper bound of accepted fundamentals, above the high E string at the
/// 12th fret.
pub const MAX_FREQUENCY: f32 = 1400.0;

/// Minimum RMS for a window to be considered signal rather than silence.
pub const AMPLITUDE_THRESHOLD: f32 = 0.01;

const YIN_THRESHOLD: f32 = 0.15;
const YIN_FALLBACK_CLARITY: f32 = 0.5;
const ACF_CLARITY_THRESHOLD: f32 = 0.5;
const ACF_SUBHARMONIC_RATIO: f32 = 0.9;

/// Per-session estimator configuration.
///
/// Fixed for the lifetime of a capture session; the detectors themselves
/// keep no state between windows.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    pub sample_rate: u32,
    pub window_size: usize,
    /// RMS gate below which a window is treated as silence.
    pub amplitude_threshold: f32,
    pub min_frequency: f32,
    pub max_frequency: f32,
}

impl EstimatorConfig {
    pub fn for_sample_rate(sample_rate: u32) -> EstimatorConfig {
        EstimatorConfig {
            sample_rate,
            window_size: ANALYSIS_WINDOW,
            amplitude_threshold: AMPLITUDE_THRESHOLD,
            min_frequency: MIN_FREQUENCY,
            max_frequency: MAX_FREQUENCY,
        }
    }
}

/// A single pitch-detection strategy.
///
/// Implementations are pure with respect to the window: the same input
/// always yields the same estimate.
pub trait PitchDetector: Send {
    fn name(&self) -> &'static str;

    /// Returns the estimated fundamental in Hz, or `None` when the window
    /// carries no pitch this strategy can commit to.
    fn detect(&self, window: &[f32]) -> Option<f32>;
}

/// Lag range searched by the time-domain detectors, clamped so the
/// difference loops never index past the window.
fn lag_bounds(
    sample_rate: u32,
    min_frequency: f32,
    max_frequency: f32,
    window_len: usize,
) -> Option<(usize, usize)> {
    let min_lag = (sample_rate as f32 / max_frequency).ceil() as usize;
    let max_lag = (sample_rate as f32 / min_frequency).floor() as usize;
    let max_lag = max_lag.min(window_len / 2);
    if min_lag < 2 || min_lag >= max_lag {
        return None;
    }
    Some((min_lag, max_lag))
}

/// Parabolic interpolation through three equally spaced values, returning
/// the fractional offset of the extremum from the center point.
fn parabolic_shift(left: f32, center: f32, right: f32) -> f32 {
    let denominator = 2.0 * (2.0 * center - left - right);
    if denominator.abs() > 1e-10 {
        (left - right) / denominator
    } else {
        0.0
    }
}

/// YIN pitch detector.
///
/// The primary strategy: cumulative-mean-normalized difference with an
/// absolute threshold, a walk down to the bottom of the accepting valley,
/// and a clarity check so broadband noise is rejected rather than
/// reported as a random lag.
pub struct YinDetector {
    sample_rate: u32,
    min_frequency: f32,
    max_frequency: f32,
}

impl YinDetector {
    pub fn new(config: &EstimatorConfig) -> YinDetector {
        YinDetector {
            sample_rate: config.sample_rate,
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
        }
    }
}

impl PitchDetector for YinDetector {
    fn name(&self) -> &'static str {
        "yin"
    }

    fn detect(&self, window: &[f32]) -> Option<f32> {
        let (min_lag, max_lag) = lag_bounds(
            self.sample_rate,
            self.min_frequency,
            self.max_frequency,
            window.len(),
        )?;
        let half_len = window.len() / 2;

        // Difference function d(tau) over the first half of the window.
        let mut diff = vec![0.0_f32; max_lag + 1];
        for tau in 1..=max_lag {
            let mut sum = 0.0_f32;
            for i in 0..half_len {
                let delta = window[i] - window[i + tau];
                sum += delta * delta;
            }
            diff[tau] = sum;
        }

        // Cumulative mean normalized difference d'(tau).
        let mut cmnd = vec![1.0_f32; max_lag + 1];
        let mut running_sum = 0.0_f32;
        for tau in 1..=max_lag {
            running_sum += diff[tau];
            cmnd[tau] = if running_sum > 0.0 {
                diff[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }

        // First dip under the absolute threshold, walked down to the
        // bottom of its valley. Lags shorter than min_lag would alias
        // above the instrument range and are never considered.
        let mut period = 0_usize;
        for tau in min_lag..=max_lag {
            if cmnd[tau] < YIN_THRESHOLD {
                let mut bottom = tau;
                while bottom + 1 <= max_lag && cmnd[bottom + 1] < cmnd[bottom] {
                    bottom += 1;
                }
                period = bottom;
                break;
            }
        }

        // No dip: fall back to the global minimum, but only if it is
        // clear enough to be a tone rather than noise.
        if period == 0 {
            let mut min_value = f32::MAX;
            for tau in min_lag..=max_lag {
                if cmnd[tau] < min_value {
                    min_value = cmnd[tau];
                    period = tau;
                }
            }
            if min_value > YIN_FALLBACK_CLARITY {
                return None;
            }
        }

        let refined = if period > min_lag && period < max_lag {
            period as f32 + parabolic_shift(cmnd[period - 1], cmnd[period], cmnd[period + 1])
        } else {
            period as f32
        };
        if refined <= 0.0 {
            return None;
        }

        let frequency = self.sample_rate as f32 / refined;
        frequency.is_finite().then_some(frequency)
    }
}

/// Normalized-autocorrelation pitch detector.
///
/// The fallback strategy, tuned for the low strings: per-lag normalization
/// keeps long lags competitive, and a subharmonic walk halves the chosen
/// lag while the halved lag correlates nearly as well, which pins
/// harmonic-heavy low notes to their true fundamental.
pub struct AutocorrelationDetector {
    sample_rate: u32,
    min_frequency: f32,
    max_frequency: f32,
}

impl AutocorrelationDetector {
    pub fn new(config: &EstimatorConfig) -> AutocorrelationDetector {
        AutocorrelationDetector {
            sample_rate: config.sample_rate,
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
        }
    }
}

impl PitchDetector for AutocorrelationDetector {
    fn name(&self) -> &'static str {
        "autocorrelation"
    }

    fn detect(&self, window: &[f32]) -> Option<f32> {
        let (min_lag, max_lag) = lag_bounds(
            self.sample_rate,
            self.min_frequency,
            self.max_frequency,
            window.len(),
        )?;

        // Correlate against the DC-centered signal.
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        let energy: f32 = window.iter().map(|&s| (s - mean) * (s - mean)).sum();
        if energy <= 1e-8 {
            return None;
        }
        let energy_per_sample = energy / window.len() as f32;

        // r(tau), normalized per overlapping sample so long lags are not
        // penalized for having fewer terms.
        let mut correlation = vec![0.0_f32; max_lag + 1];
        for tau in min_lag..=max_lag {
            let overlap = window.len() - tau;
            let mut sum = 0.0_f32;
            for i in 0..overlap {
                sum += (window[i] - mean) * (window[i + tau] - mean);
            }
            correlation[tau] = sum / overlap as f32;
        }

        // The peak search starts after the first non-positive lag.
        // Correlation decays monotonically from lag zero for any period
        // longer than the search range, so a maximum taken before the
        // first zero crossing would just be the shortest lag.
        let search_start = (min_lag..=max_lag).find(|&tau| correlation[tau] <= 0.0)?;

        let mut best_tau = search_start;
        for tau in search_start..=max_lag {
            if correlation[tau] > correlation[best_tau] {
                best_tau = tau;
            }
        }

        let clarity = correlation[best_tau] / energy_per_sample;
        if clarity < ACF_CLARITY_THRESHOLD {
            return None;
        }

        // Subharmonic correction: a pick at 2x or 4x the true period shows
        // an equally strong peak at half the lag.
        while best_tau / 2 >= min_lag
            && correlation[best_tau / 2] >= ACF_SUBHARMONIC_RATIO * correlation[best_tau]
        {
            best_tau /= 2;
        }

        let refined = if best_tau > min_lag && best_tau < max_lag {
            // The parabola through a maximum mirrors the minimum case.
            best_tau as f32
                + parabolic_shift(
                    -correlation[best_tau - 1],
                    -correlation[best_tau],
                    -correlation[best_tau + 1],
                )
        } else {
            best_tau as f32
        };
        if refined <= 0.0 {
            return None;
        }

        let frequency = self.sample_rate as f32 / refined;
        frequency.is_finite().then_some(frequency)
    }
}

/// The frequency estimator: energy gate, ordered detector strategies, and
/// spectral refinement of the accepted estimate.
pub struct FrequencyEstimator {
    config: EstimatorConfig,
    detectors: Vec<Box<dyn PitchDetector>>,
    spectrum: SpectrumAnalyzer,
}

impl FrequencyEstimator {
    pub fn new(config: EstimatorConfig) -> FrequencyEstimator {
        let detectors: Vec<Box<dyn PitchDetector>> = vec![
            Box::new(YinDetector::new(&config)),
            Box::new(AutocorrelationDetector::new(&config)),
        ];
        let spectrum = SpectrumAnalyzer::new(config.window_size);
        FrequencyEstimator {
            config,
            detectors,
            spectrum,
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimates the fundamental frequency of one window.
    ///
    /// Returns `None` for silence, noise, and out-of-range pitches; that
    /// is the normal result between notes, not a failure.
    pub fn estimate(&self, window: &[f32]) -> Option<f32> {
        if window.len() < 2 {
            return None;
        }

        // Energy gate: below the floor nothing is worth analyzing, and
        // low-level noise would otherwise read as a random pitch.
        let rms =
            (window.iter().map(|&s| s * s).sum::<f32>() / window.len() as f32).sqrt();
        let peak = window.iter().fold(0.0_f32, |acc, &s| acc.max(s.abs()));
        if rms < self.config.amplitude_threshold
            || peak < 2.0 * self.config.amplitude_threshold
        {
            return None;
        }

        for detector in &self.detectors {
            if let Some(rough) = detector.detect(window) {
                if rough >= self.config.min_frequency && rough <= self.config.max_frequency {
                    let magnitudes = self.spectrum.magnitudes(window);
                    let refined = self
                        .spectrum
                        .refine_peak(&magnitudes, rough, self.config.sample_rate)
                        .unwrap_or(rough);
                    return Some(refined);
                }
            }
        }
        None
    }
}
