//! Configuration parameters for the tuner

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};
use crate::estimator::EstimatorConfig;
use crate::meter::MeterScale;
use crate::sampler::BUFFER_SIZE;
use crate::tuning::{EDGE_SEMITONES, NoteBuckets, OpenString, STANDARD_TUNING};

/// Tuner configuration, normally read from a TOML file.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Samples per detection window (default: 2048)
    pub buffer_len: usize,

    /// Push a frequency to telemetry every this many cycles (default: 20)
    pub telemetry_every: u32,

    /// Correlation parameters
    pub estimator: EstimatorConfig,

    /// Needle/dial mapping
    pub meter: MeterScale,

    /// Open strings for a non-standard tuning, lowest first.
    /// Standard EADGBE is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strings: Option<Vec<OpenString>>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            buffer_len: BUFFER_SIZE,
            telemetry_every: 20,
            estimator: EstimatorConfig::default(),
            meter: MeterScale::default(),
            strings: None,
        }
    }
}

impl TunerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| TunerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| TunerError::Config(e.to_string()))
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        let sample_size = self.estimator.sample_size;
        if sample_size == 0 {
            return Err(TunerError::Config("estimator.sample_size must be at least 1".to_string()));
        }

        // Two full peaks have to fit after the kernel.
        if self.buffer_len < sample_size.saturating_mul(2) {
            return Err(TunerError::Config(format!(
                "buffer_len ({}) must be at least twice estimator.sample_size ({})",
                self.buffer_len, sample_size
            )));
        }

        let threshold = self.estimator.threshold;
        if !(threshold.is_finite() && threshold > 0.0 && threshold <= 1.0) {
            return Err(TunerError::Config(format!(
                "estimator.threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        if self.telemetry_every == 0 {
            return Err(TunerError::Config("telemetry_every must be at least 1".to_string()));
        }

        if !(self.meter.full_scale_semitones.is_finite() && self.meter.full_scale_semitones > 0.0) {
            return Err(TunerError::Config(format!(
                "meter.full_scale_semitones must be positive, got {}",
                self.meter.full_scale_semitones
            )));
        }

        self.buckets().map(|_| ())
    }

    /// Bucket table for the configured tuning.
    pub fn buckets(&self) -> Result<NoteBuckets> {
        match &self.strings {
            Some(strings) => NoteBuckets::from_open_strings(strings, EDGE_SEMITONES)
                .map_err(|e| TunerError::Config(format!("strings: {}", e))),
            None => Ok((*STANDARD_TUNING).clone()),
        }
    }
}
