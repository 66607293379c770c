//! # Tuning Session Module
//!
//! Runs detection cycles end to end: sample, condition, estimate, classify,
//! indicate, and occasionally report to telemetry.
//!
//! Everything that carries over between cycles lives in [`SessionState`],
//! which the caller owns and passes in. A [`TuningSession`] itself is
//! immutable once built.

use std::time::{Duration, Instant};

use crate::condition::{WaveStats, condition};
use crate::config::TunerConfig;
use crate::error::Result;
use crate::estimator::PeriodicityEstimator;
use crate::meter::{IndicatorState, MeterScale};
use crate::sampler::{SampleFrame, Sampler};
use crate::telemetry::TelemetrySink;
use crate::tuning::{Classification, NoteBuckets, classify};

/// Display/motor collaborator that renders each cycle's result.
pub trait Indicator {
    fn show(&mut self, state: &IndicatorState) -> Result<()>;
}

/// Caller-held state that spans cycles.
#[derive(Debug, Clone)]
pub struct SessionState {
    cycles: u64,
    cycles_since_push: u32,
    started: Instant,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            cycles: 0,
            cycles_since_push: 0,
            started: Instant::now(),
        }
    }

    /// Number of completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything one cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    pub stats: WaveStats,
    pub time_step: f32,
    pub frequency: Option<f32>,
    pub classification: Classification,
    pub indicator: IndicatorState,
    /// Whether this cycle's frequency was pushed to telemetry.
    pub telemetry_pushed: bool,
}

/// The detection pipeline, configured once.
#[derive(Debug, Clone)]
pub struct TuningSession {
    estimator: PeriodicityEstimator,
    buckets: NoteBuckets,
    meter: MeterScale,
    telemetry_every: u32,
}

impl TuningSession {
    /// Builds a session from a validated configuration.
    pub fn new(config: &TunerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            estimator: PeriodicityEstimator::new(config.estimator),
            buckets: config.buckets()?,
            meter: config.meter,
            telemetry_every: config.telemetry_every,
        })
    }

    pub fn buckets(&self) -> &NoteBuckets {
        &self.buckets
    }

    pub fn meter(&self) -> &MeterScale {
        &self.meter
    }

    /// Runs one detection cycle over an already-acquired frame.
    ///
    /// Telemetry failures are logged and do not fail the cycle.
    pub fn cycle(
        &self,
        state: &mut SessionState,
        frame: &SampleFrame,
        telemetry: &mut dyn TelemetrySink,
    ) -> Result<CycleReport> {
        let stats = WaveStats::of(&frame.samples)?;
        let time_step = frame.time_step()?;

        tracing::debug!(
            "Frame stats: max={:.4}V min={:.4}V ptp={:.4}V avg={:.4}V size={} step={:.3e}s",
            stats.max,
            stats.min,
            stats.peak_to_peak,
            stats.mean,
            stats.len,
            time_step
        );

        let wave = condition(&frame.samples)?;
        let frequency = self.estimator.estimate(&wave, time_step)?;
        let classification = classify(frequency, &self.buckets);
        let indicator =
            IndicatorState::from_classification(frequency, &classification, &self.buckets, &self.meter);

        state.cycles += 1;
        state.cycles_since_push += 1;

        let telemetry_pushed = state.cycles_since_push >= self.telemetry_every;
        if telemetry_pushed {
            state.cycles_since_push = 0;
            if let Err(e) = telemetry.record_frequency(frequency) {
                tracing::warn!("Failed to push frequency to telemetry: {}", e);
            }
        }

        Ok(CycleReport {
            cycle: state.cycles,
            stats,
            time_step,
            frequency,
            classification,
            indicator,
            telemetry_pushed,
        })
    }

    /// Acquires a frame, runs a cycle and shows the result.
    pub fn run_cycle(
        &self,
        state: &mut SessionState,
        sampler: &mut dyn Sampler,
        indicator: &mut dyn Indicator,
        telemetry: &mut dyn TelemetrySink,
    ) -> Result<CycleReport> {
        let frame = sampler.next_frame()?;
        let report = self.cycle(state, &frame, telemetry)?;
        indicator.show(&report.indicator)?;
        Ok(report)
    }

    /// Ends the session and reports how long tuning took.
    pub fn finish(&self, state: SessionState, telemetry: &mut dyn TelemetrySink) -> Duration {
        let total = state.elapsed();
        tracing::info!(
            "Tuning session finished after {} cycles in {:.1}s",
            state.cycles,
            total.as_secs_f64()
        );
        if let Err(e) = telemetry.record_duration(total) {
            tracing::warn!("Failed to push tuning time to telemetry: {}", e);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TunerError;
    use crate::sampler::SynthSampler;

    #[derive(Default)]
    struct RecordingSink {
        frequencies: Vec<Option<f32>>,
        durations: Vec<Duration>,
    }

    impl TelemetrySink for RecordingSink {
        fn record_frequency(&mut self, frequency: Option<f32>) -> Result<()> {
            self.frequencies.push(frequency);
            Ok(())
        }

        fn record_duration(&mut self, duration: Duration) -> Result<()> {
            self.durations.push(duration);
            Ok(())
        }
    }

    struct FailingSink;

    impl TelemetrySink for FailingSink {
        fn record_frequency(&mut self, _frequency: Option<f32>) -> Result<()> {
            Err(TunerError::Telemetry("offline".to_string()))
        }

        fn record_duration(&mut self, _duration: Duration) -> Result<()> {
            Err(TunerError::Telemetry("offline".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingIndicator {
        shown: Vec<IndicatorState>,
    }

    impl Indicator for RecordingIndicator {
        fn show(&mut self, state: &IndicatorState) -> Result<()> {
            self.shown.push(state.clone());
            Ok(())
        }
    }

    fn small_config(telemetry_every: u32) -> TunerConfig {
        TunerConfig {
            telemetry_every,
            ..TunerConfig::default()
        }
    }

    #[test]
    fn test_telemetry_every_n_cycles() {
        let session = TuningSession::new(&small_config(3)).unwrap();
        let mut state = SessionState::new();
        let mut sink = RecordingSink::default();
        let frame = SampleFrame::new(vec![0.0; 2048], Duration::from_millis(256));

        let pushed: Vec<bool> = (0..7)
            .map(|_| session.cycle(&mut state, &frame, &mut sink).unwrap().telemetry_pushed)
            .collect();

        assert_eq!(pushed, vec![false, false, true, false, false, true, false]);
        assert_eq!(sink.frequencies, vec![None, None]);
        assert_eq!(state.cycles(), 7);
    }

    #[test]
    fn test_run_cycle_shows_string() {
        let session = TuningSession::new(&TunerConfig::default()).unwrap();
        let mut state = SessionState::new();
        let mut sampler = SynthSampler::new(110.0, 8000.0, 2048).with_bias(1.65).with_amplitude(0.4);
        let mut indicator = RecordingIndicator::default();
        let mut sink = RecordingSink::default();

        let report = session
            .run_cycle(&mut state, &mut sampler, &mut indicator, &mut sink)
            .unwrap();

        assert_eq!(report.cycle, 1);
        assert_eq!(report.classification.bucket, Some(1));
        assert_eq!(indicator.shown.len(), 1);
        assert!(matches!(
            indicator.shown[0],
            IndicatorState::OnString { bucket: 1, .. }
        ));
    }

    #[test]
    fn test_silence_is_neutral() {
        let session = TuningSession::new(&TunerConfig::default()).unwrap();
        let mut state = SessionState::new();
        let frame = SampleFrame::new(vec![1.65; 2048], Duration::from_millis(256));

        let report = session.cycle(&mut state, &frame, &mut RecordingSink::default()).unwrap();

        assert_eq!(report.frequency, None);
        assert_eq!(report.indicator, IndicatorState::Neutral { frequency: None });
    }

    #[test]
    fn test_telemetry_failure_does_not_fail_cycle() {
        let session = TuningSession::new(&small_config(1)).unwrap();
        let mut state = SessionState::new();
        let frame = SampleFrame::new(vec![0.0; 2048], Duration::from_millis(256));

        let report = session.cycle(&mut state, &frame, &mut FailingSink).unwrap();
        assert!(report.telemetry_pushed);

        session.finish(state, &mut FailingSink);
    }

    #[test]
    fn test_finish_reports_duration() {
        let session = TuningSession::new(&TunerConfig::default()).unwrap();
        let mut sink = RecordingSink::default();

        let total = session.finish(SessionState::new(), &mut sink);

        assert_eq!(sink.durations, vec![total]);
    }

    #[test]
    fn test_empty_frame_is_invalid() {
        let session = TuningSession::new(&TunerConfig::default()).unwrap();
        let frame = SampleFrame::new(vec![], Duration::from_millis(1));
        let err = session
            .cycle(&mut SessionState::new(), &frame, &mut RecordingSink::default())
            .unwrap_err();
        assert!(matches!(err, TunerError::InvalidInput(_)));
    }
}
