//! # Guitar Tuning Module
//!
//! Maps a detected frequency onto the open string it is most likely meant
//! to be, and measures how far off it is.
//!
//! Each open string owns a contiguous frequency bucket. Interior bucket
//! edges sit at the geometric midpoint between adjacent strings; the outer
//! edges extend a fixed number of semitones beyond the lowest and highest
//! strings. Deviation is measured in equal-temperament semitones.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// An open string to tune against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenString {
    /// Note name (e.g., "E2", "A2")
    pub name: String,
    /// Target frequency in Hz
    pub frequency: f32,
}

/// A frequency range `[lower, upper)` mapped to one open string.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteBucket {
    pub name: String,
    pub lower: f32,
    pub upper: f32,
    /// Target frequency of the string this bucket belongs to.
    pub reference: f32,
}

impl NoteBucket {
    fn new(name: &str, lower: f32, upper: f32, reference: f32) -> Self {
        Self {
            name: name.to_string(),
            lower,
            upper,
            reference,
        }
    }

    pub fn contains(&self, frequency: f32) -> bool {
        frequency >= self.lower && frequency < self.upper
    }
}

/// Ordered, contiguous bucket table, lowest frequency first.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteBuckets {
    buckets: Vec<NoteBucket>,
}

/// Outer bucket margin for the standard table, in semitones.
pub const EDGE_SEMITONES: f32 = 2.5;

/// Standard EADGBE tuning.
///
/// Bounds are fixed literals rather than derived at runtime so that the
/// published edges (e.g. G3/B3 at exactly 220 Hz) are reproduced exactly.
pub static STANDARD_TUNING: Lazy<NoteBuckets> = Lazy::new(|| NoteBuckets {
    buckets: vec![
        NoteBucket::new("E2", 71.326, 95.209, 82.407),
        NoteBucket::new("A2", 95.209, 127.089, 110.000),
        NoteBucket::new("D3", 127.089, 169.643, 146.832),
        NoteBucket::new("G3", 169.643, 220.000, 195.998),
        NoteBucket::new("B3", 220.000, 285.305, 246.942),
        NoteBucket::new("E4", 285.305, 380.836, 329.628),
    ],
});

impl NoteBuckets {
    /// Builds a table from explicit buckets.
    ///
    /// # Errors
    /// * `TunerError::InvalidInput` if the table is empty, a bucket is
    ///   inverted, adjacent buckets leave a gap or overlap, or a reference
    ///   falls outside its own bucket
    pub fn new(buckets: Vec<NoteBucket>) -> Result<Self> {
        if buckets.is_empty() {
            return Err(TunerError::InvalidInput(
                "Bucket table must not be empty".to_string(),
            ));
        }

        for bucket in &buckets {
            if !(bucket.lower.is_finite() && bucket.upper.is_finite() && bucket.lower < bucket.upper) {
                return Err(TunerError::InvalidInput(format!(
                    "Bucket {} has an invalid range [{}, {})",
                    bucket.name, bucket.lower, bucket.upper
                )));
            }
            if !bucket.contains(bucket.reference) {
                return Err(TunerError::InvalidInput(format!(
                    "Bucket {} reference {} lies outside [{}, {})",
                    bucket.name, bucket.reference, bucket.lower, bucket.upper
                )));
            }
        }

        for pair in buckets.windows(2) {
            if pair[0].upper != pair[1].lower {
                return Err(TunerError::InvalidInput(format!(
                    "Buckets {} and {} are not contiguous",
                    pair[0].name, pair[1].name
                )));
            }
        }

        Ok(Self { buckets })
    }

    /// Derives a bucket table from a list of open strings.
    ///
    /// # Arguments
    /// * `strings` - Open strings in ascending frequency order
    /// * `edge_semitones` - How far the outermost buckets extend past the
    ///   lowest and highest strings
    pub fn from_open_strings(strings: &[OpenString], edge_semitones: f32) -> Result<Self> {
        if strings.is_empty() {
            return Err(TunerError::InvalidInput(
                "At least one open string is required".to_string(),
            ));
        }
        if !(edge_semitones.is_finite() && edge_semitones > 0.0) {
            return Err(TunerError::InvalidInput(format!(
                "Edge margin must be positive, got {}",
                edge_semitones
            )));
        }
        if strings.iter().any(|s| !(s.frequency.is_finite() && s.frequency > 0.0)) {
            return Err(TunerError::InvalidInput(
                "Open string frequencies must be positive".to_string(),
            ));
        }
        if strings.windows(2).any(|pair| pair[0].frequency >= pair[1].frequency) {
            return Err(TunerError::InvalidInput(
                "Open strings must be in ascending frequency order".to_string(),
            ));
        }

        let edge_ratio = 2.0_f32.powf(edge_semitones / 12.0);
        let boundaries: Vec<f32> = std::iter::once(strings[0].frequency / edge_ratio)
            .chain(
                strings
                    .windows(2)
                    .map(|pair| (pair[0].frequency * pair[1].frequency).sqrt()),
            )
            .chain(std::iter::once(strings[strings.len() - 1].frequency * edge_ratio))
            .collect();

        let buckets = strings
            .iter()
            .zip(boundaries.windows(2))
            .map(|(string, edges)| NoteBucket::new(&string.name, edges[0], edges[1], string.frequency))
            .collect();

        Self::new(buckets)
    }

    /// Index of the first bucket containing `frequency`.
    pub fn find(&self, frequency: f32) -> Option<usize> {
        self.buckets.iter().position(|bucket| bucket.contains(frequency))
    }

    pub fn get(&self, index: usize) -> Option<&NoteBucket> {
        self.buckets.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteBucket> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Signed pitch distance from `reference` in semitones.
///
/// Positive values are sharp, negative values are flat.
pub fn semitone_deviation(frequency: f32, reference: f32) -> f32 {
    12.0 * (frequency / reference).log2()
}

/// Outcome of matching a frequency against the bucket table.
///
/// Both fields are `None` when nothing matched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Classification {
    pub bucket: Option<usize>,
    pub deviation: Option<f32>,
}

impl Classification {
    pub fn is_match(&self) -> bool {
        self.bucket.is_some()
    }
}

/// Selects the bucket for `frequency` and the deviation from its string.
///
/// `None`, non-finite and out-of-range frequencies all classify as no match.
pub fn classify(frequency: Option<f32>, buckets: &NoteBuckets) -> Classification {
    let Some(frequency) = frequency.filter(|f| f.is_finite()) else {
        return Classification::default();
    };

    match buckets.find(frequency) {
        Some(index) => Classification {
            bucket: Some(index),
            deviation: Some(semitone_deviation(frequency, buckets.buckets[index].reference)),
        },
        None => Classification::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn standard_strings() -> Vec<OpenString> {
        [
            ("E2", 82.407),
            ("A2", 110.0),
            ("D3", 146.832),
            ("G3", 195.998),
            ("B3", 246.942),
            ("E4", 329.628),
        ]
        .iter()
        .map(|&(name, frequency)| OpenString {
            name: name.to_string(),
            frequency,
        })
        .collect()
    }

    #[test]
    fn test_standard_table_is_valid() {
        let table = NoteBuckets::new(STANDARD_TUNING.iter().cloned().collect()).unwrap();
        assert_eq!(table.len(), 6);
        assert_eq!(table.get(1).unwrap().name, "A2");
    }

    #[test]
    fn test_classify_midpoint_goes_to_upper_bucket() {
        let result = classify(Some(220.0), &STANDARD_TUNING);

        assert_eq!(result.bucket, Some(4));
        let expected = 12.0 * (220.0_f32 / 246.942).log2();
        assert_abs_diff_eq!(result.deviation.unwrap(), expected, epsilon = 1e-5);
    }

    #[test]
    fn test_classify_on_pitch() {
        let result = classify(Some(110.0), &STANDARD_TUNING);
        assert_eq!(result.bucket, Some(1));
        assert_abs_diff_eq!(result.deviation.unwrap(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_classify_no_detection() {
        assert_eq!(classify(None, &STANDARD_TUNING), Classification::default());
    }

    #[test]
    fn test_classify_out_of_range() {
        assert!(!classify(Some(50.0), &STANDARD_TUNING).is_match());
        assert!(!classify(Some(380.836), &STANDARD_TUNING).is_match());
        assert!(!classify(Some(f32::NAN), &STANDARD_TUNING).is_match());
        assert_eq!(classify(Some(71.326), &STANDARD_TUNING).bucket, Some(0));
    }

    #[test]
    fn test_semitone_deviation_octave() {
        assert_abs_diff_eq!(semitone_deviation(220.0, 110.0), 12.0, epsilon = 1e-5);
        assert_abs_diff_eq!(semitone_deviation(55.0, 110.0), -12.0, epsilon = 1e-5);
    }

    #[test]
    fn test_from_open_strings_matches_standard_table() {
        let derived = NoteBuckets::from_open_strings(&standard_strings(), EDGE_SEMITONES).unwrap();

        for (a, b) in derived.iter().zip(STANDARD_TUNING.iter()) {
            assert_eq!(a.name, b.name);
            assert_abs_diff_eq!(a.lower, b.lower, epsilon = 0.01);
            assert_abs_diff_eq!(a.upper, b.upper, epsilon = 0.01);
            assert_eq!(a.reference, b.reference);
        }
    }

    #[test]
    fn test_from_open_strings_rejects_unsorted() {
        let mut strings = standard_strings();
        strings.swap(0, 1);
        assert!(NoteBuckets::from_open_strings(&strings, EDGE_SEMITONES).is_err());
        assert!(NoteBuckets::from_open_strings(&[], EDGE_SEMITONES).is_err());
    }

    #[test]
    fn test_new_rejects_gap() {
        let buckets = vec![
            NoteBucket::new("A", 100.0, 120.0, 110.0),
            NoteBucket::new("B", 121.0, 140.0, 130.0),
        ];
        assert!(NoteBuckets::new(buckets).is_err());
    }

    #[test]
    fn test_new_rejects_reference_outside_bucket() {
        let buckets = vec![NoteBucket::new("A", 100.0, 120.0, 130.0)];
        assert!(NoteBuckets::new(buckets).is_err());
    }
}
