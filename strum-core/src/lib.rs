// strum-core/src/lib.rs

//! The core logic for the strum guitar tuner.
//! This crate turns a window of sampled guitar audio into a detected
//! frequency, the open string it belongs to, and how sharp or flat it is.
//! It is completely headless: sampling hardware, displays and telemetry
//! back ends plug in through the [`Sampler`], [`Indicator`] and
//! [`TelemetrySink`] traits.
//!
//! ```
//! use strum_core::{classify, condition, estimate_frequency, STANDARD_TUNING};
//!
//! let wave: Vec<f32> = (0..2048)
//!     .map(|i| 1.65 + 0.5 * (2.0 * std::f32::consts::PI * 110.0 * i as f32 / 8000.0).sin())
//!     .collect();
//!
//! let centered = condition(&wave)?;
//! let frequency = estimate_frequency(&centered, 1.0 / 8000.0, 512, 0.9)?;
//! let result = classify(frequency, &STANDARD_TUNING);
//!
//! assert_eq!(result.bucket, Some(1)); // A2
//! # Ok::<(), strum_core::TunerError>(())
//! ```

#[cfg(feature = "capture")]
pub mod audio;
pub mod condition;
pub mod config;
pub mod correlation;
pub mod error;
pub mod estimator;
pub mod meter;
pub mod sampler;
pub mod session;
pub mod telemetry;
pub mod tuning;

pub use condition::{WaveStats, condition};
pub use config::TunerConfig;
pub use correlation::ConvolutionMethod;
pub use error::{Result, TunerError};
pub use estimator::{
    DEFAULT_SAMPLE_SIZE, DEFAULT_THRESHOLD, EstimatorConfig, PeriodicityEstimator, estimate_frequency,
};
pub use meter::{IndicatorState, MeterScale};
pub use sampler::{ADC_REFERENCE_VOLTS, SampleFrame, Sampler, SynthSampler, adc_to_volts};
pub use session::{CycleReport, Indicator, SessionState, TuningSession};
pub use telemetry::{JsonLinesSink, NullSink, TelemetrySink, TracingSink};
pub use tuning::{Classification, NoteBucket, NoteBuckets, STANDARD_TUNING, classify};
