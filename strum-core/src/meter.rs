//! # Tuning Meter Module
//!
//! Turns a classification into what the indicator hardware needs: which
//! string to light and where to put the needle.

use serde::{Deserialize, Serialize};

use crate::tuning::{Classification, NoteBuckets};

/// Linear needle scale centred on "in tune".
///
/// A deviation of `full_scale_semitones` puts the needle `half_span` units
/// away from `center`. Units are whatever the dial understands; the stock
/// dial uses degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterScale {
    pub center: f32,
    pub half_span: f32,
    pub full_scale_semitones: f32,
}

impl Default for MeterScale {
    fn default() -> Self {
        Self {
            center: 151.0,
            half_span: 61.0,
            full_scale_semitones: 2.5,
        }
    }
}

impl MeterScale {
    /// Needle deflection in [-1, 1]; negative is flat.
    pub fn needle(&self, deviation: f32) -> f32 {
        (deviation / self.full_scale_semitones).clamp(-1.0, 1.0)
    }

    /// Absolute dial position for `deviation`.
    pub fn dial_position(&self, deviation: f32) -> f32 {
        self.center + self.half_span * self.needle(deviation)
    }
}

/// What the display/motor collaborator should show for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorState {
    /// No string matched. The needle rests at centre and no string is lit.
    Neutral { frequency: Option<f32> },
    /// A string matched.
    OnString {
        bucket: usize,
        name: String,
        frequency: f32,
        deviation: f32,
        needle: f32,
        dial_position: f32,
    },
}

impl IndicatorState {
    /// Builds the indicator state from a frequency and its classification.
    pub fn from_classification(
        frequency: Option<f32>,
        classification: &Classification,
        buckets: &NoteBuckets,
        scale: &MeterScale,
    ) -> Self {
        let matched = classification
            .bucket
            .zip(classification.deviation)
            .zip(frequency)
            .and_then(|((index, deviation), frequency)| {
                buckets.get(index).map(|bucket| (index, bucket, deviation, frequency))
            });

        match matched {
            Some((bucket, note, deviation, frequency)) => IndicatorState::OnString {
                bucket,
                name: note.name.clone(),
                frequency,
                deviation,
                needle: scale.needle(deviation),
                dial_position: scale.dial_position(deviation),
            },
            None => IndicatorState::Neutral { frequency },
        }
    }

    pub fn frequency(&self) -> Option<f32> {
        match self {
            IndicatorState::Neutral { frequency } => *frequency,
            IndicatorState::OnString { frequency, .. } => Some(*frequency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{STANDARD_TUNING, classify};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_needle_scale() {
        let scale = MeterScale::default();
        assert_eq!(scale.needle(0.0), 0.0);
        assert_eq!(scale.needle(1.25), 0.5);
        assert_eq!(scale.needle(-5.0), -1.0);
        assert_eq!(scale.dial_position(2.5), 212.0);
        assert_eq!(scale.dial_position(-2.5), 90.0);
    }

    #[test]
    fn test_indicator_on_string() {
        let scale = MeterScale::default();
        let frequency = Some(112.0);
        let classification = classify(frequency, &STANDARD_TUNING);
        let state =
            IndicatorState::from_classification(frequency, &classification, &STANDARD_TUNING, &scale);

        match &state {
            IndicatorState::OnString {
                bucket,
                name,
                deviation,
                dial_position,
                ..
            } => {
                assert_eq!(*bucket, 1);
                assert_eq!(name, "A2");
                assert!(*deviation > 0.0);
                assert_abs_diff_eq!(*dial_position, scale.dial_position(*deviation));
            }
            other => panic!("expected a string match, got {other:?}"),
        }
        assert_eq!(state.frequency(), Some(112.0));
    }

    #[test]
    fn test_indicator_neutral_out_of_range() {
        let scale = MeterScale::default();
        let frequency = Some(1000.0);
        let classification = classify(frequency, &STANDARD_TUNING);
        let state =
            IndicatorState::from_classification(frequency, &classification, &STANDARD_TUNING, &scale);

        assert_eq!(state, IndicatorState::Neutral { frequency: Some(1000.0) });
    }
}
