//! # Audio Capture Module
//!
//! Live input through CPAL (Cross-Platform Audio Library). The audio
//! callback accumulates samples and forwards complete frames over a channel;
//! [`CpalSampler`] hands them to the detection loop one at a time.
//!
//! Only built with the `capture` feature.

use std::time::Duration;

use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::error::{Result, TunerError};
use crate::sampler::{SampleFrame, Sampler};

/// Preferred capture rate. Plenty of headroom above the top guitar string.
const TARGET_SAMPLE_RATE: u32 = 44100;

/// Frames buffered between the audio callback and the detector.
const FRAME_QUEUE: usize = 4;

fn capture_err(context: &str, e: impl std::fmt::Display) -> TunerError {
    TunerError::Capture(format!("{}: {}", context, e))
}

/// Sampler backed by the default input device.
///
/// The stream stops when the sampler is dropped.
pub struct CpalSampler {
    _stream: cpal::Stream,
    frames: Receiver<Vec<f32>>,
    sample_rate: u32,
}

impl CpalSampler {
    /// Opens the default input device and starts streaming frames of
    /// `frame_len` samples.
    pub fn open(frame_len: usize) -> Result<Self> {
        if frame_len == 0 {
            return Err(TunerError::InvalidInput("Frame length must be positive".to_string()));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| TunerError::Capture("No input device available".to_string()))?;

        let name = device.name().map_err(|e| capture_err("Device name", e))?;
        tracing::info!("Using audio input device: {}", name);

        let configs = device
            .supported_input_configs()
            .map_err(|e| capture_err("Querying input configs", e))?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| TunerError::Capture("No suitable f32 input format found".to_string()))?;

        let rate = TARGET_SAMPLE_RATE
            .clamp(supported_config.min_sample_rate().0, supported_config.max_sample_rate().0);
        let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
        let sample_rate = config.sample_rate().0;
        let config: cpal::StreamConfig = config.into();

        tracing::info!("Selected sample rate: {} Hz", sample_rate);

        let (sender, frames) = crossbeam_channel::bounded(FRAME_QUEUE);
        let stream = device
            .build_input_stream(
                &config,
                frame_collector(sender, frame_len),
                |err| tracing::error!("An error occurred on the audio stream: {}", err),
                None,
            )
            .map_err(|e| capture_err("Building input stream", e))?;

        stream.play().map_err(|e| capture_err("Starting input stream", e))?;

        Ok(Self {
            _stream: stream,
            frames,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Builds the audio callback that slices the stream into fixed frames.
fn frame_collector(
    sender: Sender<Vec<f32>>,
    frame_len: usize,
) -> impl FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static {
    let mut audio_buffer = Vec::with_capacity(frame_len * 2);

    move |data: &[f32], _: &cpal::InputCallbackInfo| {
        audio_buffer.extend_from_slice(data);

        while audio_buffer.len() >= frame_len {
            let frame: Vec<f32> = audio_buffer.drain(..frame_len).collect();
            // Drop the frame if the detector is behind.
            let _ = sender.try_send(frame);
        }
    }
}

impl Sampler for CpalSampler {
    fn next_frame(&mut self) -> Result<SampleFrame> {
        let samples = self
            .frames
            .recv()
            .map_err(|_| TunerError::Capture("Audio stream closed".to_string()))?;
        let elapsed = Duration::from_secs_f64(samples.len() as f64 / self.sample_rate as f64);
        Ok(SampleFrame::new(samples, elapsed))
    }
}

/// Picks a mono f32 input config whose rate range is closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            min_diff.min(max_diff)
        })
}
