//! # Periodicity Estimation Module
//!
//! Estimates the fundamental frequency of a conditioned sample window from
//! its autocorrelation.
//!
//! The leading `sample_size` samples are correlated against the whole
//! window. The global maximum of that correlation is the zero-lag peak; the
//! waveform's period is the distance from there to the next peak, found by a
//! forward scan through three phases:
//!
//! 1. **First peak**: values within `threshold` of the maximum.
//! 2. **Trough**: values below the band.
//! 3. **Second peak**: values back inside the band. The strongest of them
//!    marks the period.
//!
//! Running off the end of the correlation in any phase means no periodicity
//! was found. That is a normal outcome for silence, pick noise or a damped
//! string and is reported as `Ok(None)`.

use serde::{Deserialize, Serialize};

use crate::correlation::{ConvolutionMethod, autocorrelate};
use crate::error::{Result, TunerError};

/// Default correlation kernel length in samples.
pub const DEFAULT_SAMPLE_SIZE: usize = 512;

/// Default fraction of the correlation maximum that counts as "on peak".
pub const DEFAULT_THRESHOLD: f32 = 0.9;

/// Tunables for [`PeriodicityEstimator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Length of the correlation kernel taken from the start of the window.
    pub sample_size: usize,
    /// Fraction of the peak correlation defining the on-peak band, in (0, 1].
    pub threshold: f32,
    /// Convolution back end.
    pub method: ConvolutionMethod,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            threshold: DEFAULT_THRESHOLD,
            method: ConvolutionMethod::Direct,
        }
    }
}

/// A successful period measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodEstimate {
    /// Distance from the zero-lag peak to the second peak, in samples.
    pub lag: usize,
    /// `lag * time_delta`, in seconds.
    pub period: f32,
    /// `1 / period`, in Hz.
    pub frequency: f32,
}

/// Scan position within the peak, trough, peak search.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    FirstPeak,
    Trough,
    SecondPeak {
        start: usize,
        peak_offset: usize,
        peak_value: f32,
    },
}

/// Correlation-based fundamental frequency estimator.
#[derive(Debug, Clone, Default)]
pub struct PeriodicityEstimator {
    config: EstimatorConfig,
}

impl PeriodicityEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimates the frequency of `wave` in Hz.
    ///
    /// # Arguments
    /// * `wave` - Conditioned (zero-mean) sample window
    /// * `time_delta` - Seconds between consecutive samples
    ///
    /// # Returns
    /// * `Ok(Some(frequency))` - Detected frequency in Hz
    /// * `Ok(None)` - No reliable periodicity in this window
    /// * `Err(TunerError::InvalidInput)` - Bad window, time step or config
    pub fn estimate(&self, wave: &[f32], time_delta: f32) -> Result<Option<f32>> {
        Ok(self.scan(wave, time_delta)?.map(|estimate| estimate.frequency))
    }

    /// Like [`estimate`](Self::estimate) but also reports the lag and period.
    pub fn scan(&self, wave: &[f32], time_delta: f32) -> Result<Option<PeriodEstimate>> {
        let EstimatorConfig {
            sample_size,
            threshold,
            method,
        } = self.config;

        validate(wave, time_delta, sample_size, threshold)?;

        let correlation = autocorrelate(wave, sample_size, method);
        let Some(lag) = find_period_lag(&correlation, threshold) else {
            tracing::trace!("No second correlation peak in {} lags", correlation.len());
            return Ok(None);
        };

        let period = lag as f32 * time_delta;
        if period == 0.0 {
            return Ok(None);
        }

        let frequency = 1.0 / period;
        if !frequency.is_finite() {
            return Ok(None);
        }

        tracing::debug!(
            "Correlation period: lag={} samples, period={:.6}s, frequency={:.3}Hz",
            lag,
            period,
            frequency
        );

        Ok(Some(PeriodEstimate {
            lag,
            period,
            frequency,
        }))
    }
}

/// Estimates the frequency of a conditioned window using direct convolution.
///
/// `sample_size` and `threshold` are normally [`DEFAULT_SAMPLE_SIZE`] and
/// [`DEFAULT_THRESHOLD`].
pub fn estimate_frequency(
    wave: &[f32],
    time_delta: f32,
    sample_size: usize,
    threshold: f32,
) -> Result<Option<f32>> {
    PeriodicityEstimator::new(EstimatorConfig {
        sample_size,
        threshold,
        method: ConvolutionMethod::Direct,
    })
    .estimate(wave, time_delta)
}

fn validate(wave: &[f32], time_delta: f32, sample_size: usize, threshold: f32) -> Result<()> {
    if !(time_delta.is_finite() && time_delta > 0.0) {
        return Err(TunerError::InvalidInput(format!(
            "Time step must be positive, got {}",
            time_delta
        )));
    }

    if !(threshold.is_finite() && threshold > 0.0 && threshold <= 1.0) {
        return Err(TunerError::InvalidInput(format!(
            "Threshold must be in (0, 1], got {}",
            threshold
        )));
    }

    if sample_size == 0 || sample_size > wave.len() {
        return Err(TunerError::InvalidInput(format!(
            "Sample size {} does not fit a buffer of {} samples",
            sample_size,
            wave.len()
        )));
    }

    if wave.iter().any(|s| !s.is_finite()) {
        return Err(TunerError::InvalidInput(
            "Buffer contains non-finite samples".to_string(),
        ));
    }

    Ok(())
}

/// Returns the index and value of the first occurrence of the maximum.
fn first_max(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, best_v)) if v <= best_v => best,
            _ => Some((i, v)),
        })
}

/// Runs the three-phase scan and returns the period in samples.
///
/// `None` when the correlation ends before the second peak closes.
fn find_period_lag(correlation: &[f32], threshold: f32) -> Option<usize> {
    let (match_location, match_value) = first_max(correlation)?;
    let band = match_value * threshold;

    let mut phase = Phase::FirstPeak;
    for (offset, &value) in correlation[match_location..].iter().enumerate() {
        let on_peak = value >= band;
        phase = match (phase, on_peak) {
            (Phase::FirstPeak, true) => Phase::FirstPeak,
            (Phase::FirstPeak | Phase::Trough, false) => Phase::Trough,
            (Phase::Trough, true) => Phase::SecondPeak {
                start: offset,
                peak_offset: 0,
                peak_value: value,
            },
            (
                Phase::SecondPeak {
                    start,
                    peak_offset,
                    peak_value,
                },
                true,
            ) => {
                if value > peak_value {
                    Phase::SecondPeak {
                        start,
                        peak_offset: offset - start,
                        peak_value: value,
                    }
                } else {
                    Phase::SecondPeak {
                        start,
                        peak_offset,
                        peak_value,
                    }
                }
            }
            (
                Phase::SecondPeak {
                    start, peak_offset, ..
                },
                false,
            ) => return Some(start + peak_offset),
        };
    }

    None
}
