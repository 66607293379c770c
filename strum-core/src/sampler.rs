//! # Sampling Module
//!
//! The detection core never touches hardware. A [`Sampler`] hands it one
//! [`SampleFrame`] per cycle: the raw voltage readings together with how
//! long they actually took to acquire. Sample timing on the target board is
//! not fixed, so the time step is derived from the measured elapsed time
//! rather than a nominal sample rate.

use std::time::Duration;

use crate::error::{Result, TunerError};

/// Default number of samples per detection window.
pub const BUFFER_SIZE: usize = 2048;

/// Reference voltage of the board's ADC.
pub const ADC_REFERENCE_VOLTS: f32 = 3.3;

/// Full-scale count of a 16-bit ADC reading.
const ADC_FULL_SCALE: f32 = 65536.0;

/// Converts a raw 16-bit ADC reading to volts.
pub fn adc_to_volts(raw: u16, reference_volts: f32) -> f32 {
    raw as f32 * reference_volts / ADC_FULL_SCALE
}

/// The reading a 16-bit ADC would report for `volts`, clipped to its range.
fn adc_reading(volts: f32, reference_volts: f32) -> u16 {
    (volts / reference_volts * ADC_FULL_SCALE)
        .round()
        .clamp(0.0, u16::MAX as f32) as u16
}

/// One window of raw samples and its acquisition time.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    pub samples: Vec<f32>,
    pub elapsed: Duration,
}

impl SampleFrame {
    pub fn new(samples: Vec<f32>, elapsed: Duration) -> Self {
        Self { samples, elapsed }
    }

    /// Builds a frame from raw ADC readings, converted to volts.
    pub fn from_adc(readings: &[u16], elapsed: Duration, reference_volts: f32) -> Self {
        let samples = readings
            .iter()
            .map(|&raw| adc_to_volts(raw, reference_volts))
            .collect();
        Self { samples, elapsed }
    }

    /// Seconds between consecutive samples, assuming even spacing.
    ///
    /// # Errors
    /// * `TunerError::InvalidInput` if the frame is empty or took no time
    pub fn time_step(&self) -> Result<f32> {
        if self.samples.is_empty() {
            return Err(TunerError::InvalidInput("Empty sample frame".to_string()));
        }
        if self.elapsed.is_zero() {
            return Err(TunerError::InvalidInput(
                "Sample frame has zero elapsed time".to_string(),
            ));
        }
        Ok((self.elapsed.as_secs_f64() / self.samples.len() as f64) as f32)
    }
}

/// Source of sample frames; blocks until a full frame is available.
pub trait Sampler {
    fn next_frame(&mut self) -> Result<SampleFrame>;
}

/// Generates a phase-continuous sine, optionally biased and decaying.
///
/// Stands in for the analog front end in tests and demos.
#[derive(Debug, Clone)]
pub struct SynthSampler {
    frequency: f32,
    sample_rate: f32,
    frame_len: usize,
    amplitude: f32,
    bias: f32,
    decay_seconds: Option<f32>,
    adc_reference: Option<f32>,
    position: u64,
}

impl SynthSampler {
    pub fn new(frequency: f32, sample_rate: f32, frame_len: usize) -> Self {
        Self {
            frequency,
            sample_rate,
            frame_len,
            amplitude: 1.0,
            bias: 0.0,
            decay_seconds: None,
            adc_reference: None,
            position: 0,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// DC offset added to every sample, like an ADC biased at mid-rail.
    pub fn with_bias(mut self, bias: f32) -> Self {
        self.bias = bias;
        self
    }

    /// Exponential amplitude decay with the given time constant.
    pub fn with_decay(mut self, seconds: f32) -> Self {
        self.decay_seconds = Some(seconds);
        self
    }

    /// Passes every sample through a 16-bit ADC with the given reference,
    /// quantising it and clipping it to `0..reference_volts`.
    pub fn with_adc(mut self, reference_volts: f32) -> Self {
        self.adc_reference = Some(reference_volts);
        self
    }

    fn sample_at(&self, index: u64) -> f32 {
        let t = index as f64 / self.sample_rate as f64;
        let phase = 2.0 * std::f64::consts::PI * self.frequency as f64 * t;
        let envelope = self
            .decay_seconds
            .map_or(1.0, |tau| (-t / tau as f64).exp());
        (self.bias as f64 + self.amplitude as f64 * envelope * phase.sin()) as f32
    }
}

impl Sampler for SynthSampler {
    fn next_frame(&mut self) -> Result<SampleFrame> {
        if self.frame_len == 0 || !(self.sample_rate > 0.0) {
            return Err(TunerError::Capture(format!(
                "Synthetic sampler misconfigured: {} samples at {} Hz",
                self.frame_len, self.sample_rate
            )));
        }

        if let Some(vref) = self.adc_reference.filter(|vref| !(*vref > 0.0)) {
            return Err(TunerError::Capture(format!(
                "ADC reference must be positive, got {} V",
                vref
            )));
        }

        let start = self.position;
        let samples: Vec<f32> = (0..self.frame_len as u64)
            .map(|i| self.sample_at(start + i))
            .collect();
        self.position += self.frame_len as u64;

        let elapsed = Duration::from_secs_f64(self.frame_len as f64 / self.sample_rate as f64);
        match self.adc_reference {
            Some(vref) => {
                let readings: Vec<u16> = samples.iter().map(|&v| adc_reading(v, vref)).collect();
                Ok(SampleFrame::from_adc(&readings, elapsed, vref))
            }
            None => Ok(SampleFrame::new(samples, elapsed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_adc_to_volts() {
        assert_eq!(adc_to_volts(0, 3.3), 0.0);
        assert_abs_diff_eq!(adc_to_volts(32768, 3.3), 1.65, epsilon = 1e-6);
        assert!(adc_to_volts(u16::MAX, 3.3) < 3.3);
    }

    #[test]
    fn test_frame_from_adc() {
        let frame = SampleFrame::from_adc(&[0, 32768, 65535], Duration::from_millis(1), 3.3);
        assert_eq!(frame.samples.len(), 3);
        assert_eq!(frame.samples[0], 0.0);
        assert_abs_diff_eq!(frame.samples[1], 1.65, epsilon = 1e-6);
        assert_eq!(frame.elapsed, Duration::from_millis(1));
    }

    #[test]
    fn test_synth_through_adc_is_quantised() {
        let plain = SynthSampler::new(110.0, 8000.0, 256)
            .with_bias(1.65)
            .with_amplitude(0.5)
            .next_frame()
            .unwrap();
        let quantised = SynthSampler::new(110.0, 8000.0, 256)
            .with_bias(1.65)
            .with_amplitude(0.5)
            .with_adc(ADC_REFERENCE_VOLTS)
            .next_frame()
            .unwrap();

        let step = ADC_REFERENCE_VOLTS / 65536.0;
        for (p, q) in plain.samples.iter().zip(quantised.samples.iter()) {
            assert!((p - q).abs() <= step, "{p} V read back as {q} V");
        }
        assert_eq!(plain.elapsed, quantised.elapsed);
    }

    #[test]
    fn test_synth_adc_clips_to_rails() {
        let frame = SynthSampler::new(100.0, 8000.0, 80)
            .with_bias(1.65)
            .with_amplitude(5.0)
            .with_adc(3.3)
            .next_frame()
            .unwrap();

        assert!(frame.samples.iter().all(|&v| (0.0..3.3).contains(&v)));
        assert!(frame.samples.iter().any(|&v| v == 0.0));

        let bad = SynthSampler::new(100.0, 8000.0, 80).with_adc(0.0).next_frame();
        assert!(matches!(bad, Err(TunerError::Capture(_))));
    }

    #[test]
    fn test_time_step() {
        let frame = SampleFrame::new(vec![0.0; 2048], Duration::from_millis(256));
        assert_abs_diff_eq!(frame.time_step().unwrap(), 1.0 / 8000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_time_step_rejects_degenerate_frames() {
        assert!(SampleFrame::new(vec![], Duration::from_millis(1)).time_step().is_err());
        assert!(SampleFrame::new(vec![0.0; 4], Duration::ZERO).time_step().is_err());
    }

    #[test]
    fn test_synth_frames_are_phase_continuous() {
        let mut sampler = SynthSampler::new(50.0, 1000.0, 10);
        let first = sampler.next_frame().unwrap();
        let second = sampler.next_frame().unwrap();

        let mut whole = SynthSampler::new(50.0, 1000.0, 20);
        let both = whole.next_frame().unwrap();

        assert_eq!([first.samples, second.samples].concat(), both.samples);
        assert_eq!(first.elapsed, Duration::from_millis(10));
    }

    #[test]
    fn test_synth_bias() {
        let mut sampler = SynthSampler::new(100.0, 8000.0, 80).with_bias(1.65).with_amplitude(0.0);
        let frame = sampler.next_frame().unwrap();
        assert!(frame.samples.iter().all(|&s| s == 1.65));
    }
}
