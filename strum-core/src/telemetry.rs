//! # Telemetry Module
//!
//! Periodic reporting of detected frequencies and of the total time a
//! tuning session took. Where the records end up (a cloud channel, a log
//! file, stdout) is up to the sink.

use std::io::Write;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, TunerError};

/// Receiver of telemetry records.
pub trait TelemetrySink {
    /// Records the latest detected frequency; `None` means no detection.
    fn record_frequency(&mut self, frequency: Option<f32>) -> Result<()>;

    /// Records how long the whole tuning session took.
    fn record_duration(&mut self, duration: Duration) -> Result<()>;
}

/// A single telemetry record as written by [`JsonLinesSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum TelemetryRecord {
    Frequency(Option<f32>),
    TuningDurationSecs(f64),
}

/// Writes one JSON object per record, one record per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &TelemetryRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| TunerError::Telemetry(e.to_string()))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> TelemetrySink for JsonLinesSink<W> {
    fn record_frequency(&mut self, frequency: Option<f32>) -> Result<()> {
        self.write_record(&TelemetryRecord::Frequency(frequency))
    }

    fn record_duration(&mut self, duration: Duration) -> Result<()> {
        self.write_record(&TelemetryRecord::TuningDurationSecs(duration.as_secs_f64()))
    }
}

/// Emits telemetry as `info` log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record_frequency(&mut self, frequency: Option<f32>) -> Result<()> {
        match frequency {
            Some(hz) => tracing::info!("Telemetry frequency: {:.3} Hz", hz),
            None => tracing::info!("Telemetry frequency: no detection"),
        }
        Ok(())
    }

    fn record_duration(&mut self, duration: Duration) -> Result<()> {
        tracing::info!("Telemetry tuning time: {:.1} s", duration.as_secs_f64());
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record_frequency(&mut self, _frequency: Option<f32>) -> Result<()> {
        Ok(())
    }

    fn record_duration(&mut self, _duration: Duration) -> Result<()> {
        Ok(())
    }
}
