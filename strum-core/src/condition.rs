//! # Sample Conditioning Module
//!
//! Removes the DC offset from a raw sample window so it oscillates around
//! zero before correlation. The analog front end biases the guitar signal
//! around half the ADC reference, so raw windows sit well above zero.

use crate::error::{Result, TunerError};

/// Summary statistics of a raw sample window.
///
/// Logged once per cycle; useful when dialling in amplifier gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveStats {
    pub max: f32,
    pub min: f32,
    pub peak_to_peak: f32,
    pub mean: f32,
    pub len: usize,
}

impl WaveStats {
    /// Computes max, min, peak-to-peak and mean of `wave`.
    pub fn of(wave: &[f32]) -> Result<Self> {
        if wave.is_empty() {
            return Err(TunerError::InvalidInput(
                "Cannot compute statistics of an empty buffer".to_string(),
            ));
        }

        let (min, max) = wave
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
                (lo.min(s), hi.max(s))
            });

        Ok(Self {
            max,
            min,
            peak_to_peak: max - min,
            mean: mean(wave),
            len: wave.len(),
        })
    }
}

fn mean(wave: &[f32]) -> f32 {
    wave.iter().sum::<f32>() / wave.len() as f32
}

/// Returns a copy of `wave` with its arithmetic mean subtracted.
///
/// The output has the same length and ordering as the input and a mean of
/// zero up to rounding.
///
/// # Errors
/// * `TunerError::InvalidInput` if `wave` is empty
pub fn condition(wave: &[f32]) -> Result<Vec<f32>> {
    let mut centered = wave.to_vec();
    condition_in_place(&mut centered)?;
    Ok(centered)
}

/// In-place form of [`condition`] for callers that own the buffer.
pub fn condition_in_place(wave: &mut [f32]) -> Result<()> {
    if wave.is_empty() {
        return Err(TunerError::InvalidInput(
            "Cannot condition an empty buffer".to_string(),
        ));
    }

    let avg = mean(wave);
    for sample in wave.iter_mut() {
        *sample -= avg;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_condition_removes_bias() {
        let wave: Vec<f32> = (0..256)
            .map(|i| 1.65 + 0.3 * (i as f32 * 0.1).sin())
            .collect();

        let centered = condition(&wave).unwrap();

        assert_eq!(centered.len(), wave.len());
        let avg = centered.iter().sum::<f32>() / centered.len() as f32;
        assert_abs_diff_eq!(avg, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_condition_preserves_ordering() {
        let wave = [3.0, 1.0, 2.0, 5.0];
        let centered = condition(&wave).unwrap();

        assert_eq!(centered, vec![0.25, -1.75, -0.75, 2.25]);
    }

    #[test]
    fn test_condition_empty_is_invalid() {
        let err = condition(&[]).unwrap_err();
        assert!(matches!(err, TunerError::InvalidInput(_)));
    }

    #[test]
    fn test_condition_in_place_matches_copy() {
        let wave: [f32; 5] = [0.5, 0.7, 0.1, 0.9, 0.3];
        let mut owned = wave;
        condition_in_place(&mut owned).unwrap();

        assert_eq!(owned.to_vec(), condition(&wave).unwrap());
    }

    #[test]
    fn test_wave_stats() {
        let stats = WaveStats::of(&[1.0, -2.0, 4.0, 1.0]).unwrap();

        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.peak_to_peak, 6.0);
        assert_eq!(stats.mean, 1.0);
        assert_eq!(stats.len, 4);
    }

    #[test]
    fn test_wave_stats_empty_is_invalid() {
        assert!(WaveStats::of(&[]).is_err());
    }
}
