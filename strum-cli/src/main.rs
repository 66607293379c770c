//! # strum - Terminal Guitar Tuner
//!
//! Command-line front end for the strum tuning engine.
//!
//! ## Architecture
//! - **Main Thread**: parses arguments, renders the meter to stdout
//! - **Detector Thread**: owns the sampler, session state and telemetry sink
//! - **Communication**: crossbeam channels for indicator updates and shutdown

mod display;

use std::fs::File;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{Receiver, Sender};
use strum_core::{
    ADC_REFERENCE_VOLTS, Indicator, IndicatorState, JsonLinesSink, NullSink, Sampler, SessionState,
    SynthSampler, TelemetrySink, TracingSink, TunerConfig, TuningSession,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Mid-rail bias of the synthetic front end, in volts.
const SYNTH_BIAS: f32 = 1.65;

/// Indicator updates the detector may run ahead of the display.
const EVENT_QUEUE: usize = 1;

/// Where samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Generated sine wave
    Synth,
    /// Default audio input device (needs the `capture` feature)
    Mic,
}

/// Command-line arguments for strum
#[derive(Parser, Debug)]
#[command(name = "strum")]
#[command(about = "Correlation-based guitar tuner")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "STRUM_CONFIG")]
    config: Option<PathBuf>,

    /// Sample source
    #[arg(long, value_enum, default_value_t = Source::Synth)]
    source: Source,

    /// Frequency of the synthetic tone in Hz
    #[arg(long, default_value_t = 110.0)]
    frequency: f32,

    /// Sample rate of the synthetic tone in Hz
    #[arg(long, default_value_t = 8000.0)]
    sample_rate: f32,

    /// Number of detection cycles to run
    #[arg(long, default_value_t = 40)]
    cycles: u64,

    /// Write telemetry as JSON lines to this file instead of the log
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// Discard telemetry
    #[arg(long, conflicts_with = "telemetry")]
    no_telemetry: bool,
}

/// Messages from the detector thread to the main thread.
#[derive(Debug)]
enum DetectorEvent {
    Indicator(IndicatorState),
    Finished(Duration),
    Failed(String),
}

/// Forwards indicator updates to the main thread for rendering.
struct ChannelIndicator {
    events: Sender<DetectorEvent>,
}

impl Indicator for ChannelIndicator {
    fn show(&mut self, state: &IndicatorState) -> strum_core::Result<()> {
        // Blocks while the display is behind; fails only once it is gone.
        let _ = self.events.send(DetectorEvent::Indicator(state.clone()));
        Ok(())
    }
}

/// Everything the detector thread needs, moved into it at spawn.
struct DetectorSettings {
    config: TunerConfig,
    source: Source,
    frequency: f32,
    sample_rate: f32,
    telemetry: Option<PathBuf>,
    no_telemetry: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strum=info,strum_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(Args::parse())
}

/// Runs the tuner until `cycles` updates have been shown.
///
/// A detector failure is reported as an error once the thread has exited.
fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => TunerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TunerConfig::default(),
    };
    let buckets = config.buckets()?;

    tracing::info!(
        "Starting strum: source={:?}, buffer={} samples, kernel={} samples, threshold={}",
        args.source,
        config.buffer_len,
        config.estimator.sample_size,
        config.estimator.threshold
    );

    let (event_tx, event_rx) = event_channel();
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

    let settings = DetectorSettings {
        config,
        source: args.source,
        frequency: args.frequency,
        sample_rate: args.sample_rate,
        telemetry: args.telemetry.clone(),
        no_telemetry: args.no_telemetry,
    };
    let detector = spawn_detector(settings, event_tx, shutdown_rx);

    let mut shown = 0;
    let mut failure = None;
    if args.cycles == 0 {
        let _ = shutdown_tx.try_send(());
    }
    // Ends once the detector thread drops its sender.
    for event in event_rx.iter() {
        match event {
            DetectorEvent::Indicator(state) => {
                if shown < args.cycles {
                    println!("{}", display::render(&state, &buckets));
                    shown += 1;
                }
                if shown == args.cycles {
                    let _ = shutdown_tx.try_send(());
                }
            }
            DetectorEvent::Finished(total) => {
                println!("total tuning time: {:.1} s", total.as_secs_f64());
            }
            DetectorEvent::Failed(message) => {
                tracing::error!("Detector stopped: {}", message);
                failure = Some(message);
            }
        }
    }

    detector
        .join()
        .map_err(|_| anyhow!("Detector thread panicked"))?;

    match failure {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

/// Channel for detector events. Bounded so the detector stays in step with
/// the display and telemetry only counts cycles that were shown.
fn event_channel() -> (Sender<DetectorEvent>, Receiver<DetectorEvent>) {
    crossbeam_channel::bounded(EVENT_QUEUE)
}

/// Starts the dedicated detection thread.
///
/// The thread runs cycles until asked to stop, then reports the total
/// tuning time and exits.
fn spawn_detector(
    settings: DetectorSettings,
    events: Sender<DetectorEvent>,
    shutdown: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = run_detector(settings, events.clone(), shutdown) {
            let _ = events.send(DetectorEvent::Failed(format!("{:#}", e)));
        }
    })
}

fn run_detector(
    settings: DetectorSettings,
    events: Sender<DetectorEvent>,
    shutdown: Receiver<()>,
) -> Result<()> {
    tracing::debug!("Detector thread starting");

    let session = TuningSession::new(&settings.config)?;
    let mut sampler = open_sampler(&settings)?;
    let mut telemetry = open_telemetry(settings.telemetry.as_ref(), settings.no_telemetry)?;
    let mut indicator = ChannelIndicator {
        events: events.clone(),
    };

    let (total, outcome) = drive_session(
        &session,
        sampler.as_mut(),
        &mut indicator,
        telemetry.as_mut(),
        &shutdown,
    );
    let _ = events.send(DetectorEvent::Finished(total));
    tracing::debug!("Detector thread finished");
    outcome?;
    Ok(())
}

/// Runs cycles until shutdown is signalled or a cycle fails.
///
/// The session is finished either way, so the total tuning time always
/// reaches telemetry.
fn drive_session(
    session: &TuningSession,
    sampler: &mut dyn Sampler,
    indicator: &mut dyn Indicator,
    telemetry: &mut dyn TelemetrySink,
    shutdown: &Receiver<()>,
) -> (Duration, strum_core::Result<()>) {
    let mut state = SessionState::new();
    let mut outcome = Ok(());

    loop {
        crossbeam_channel::select! {
            recv(shutdown) -> _ => break,
            default => {}
        }

        if let Err(e) = session.run_cycle(&mut state, sampler, indicator, telemetry) {
            outcome = Err(e);
            break;
        }
    }

    (session.finish(state, telemetry), outcome)
}

fn open_sampler(settings: &DetectorSettings) -> Result<Box<dyn Sampler>> {
    match settings.source {
        Source::Synth => Ok(Box::new(
            SynthSampler::new(settings.frequency, settings.sample_rate, settings.config.buffer_len)
                .with_bias(SYNTH_BIAS)
                .with_amplitude(0.5)
                .with_adc(ADC_REFERENCE_VOLTS),
        )),
        Source::Mic => open_microphone(settings.config.buffer_len),
    }
}

#[cfg(feature = "capture")]
fn open_microphone(frame_len: usize) -> Result<Box<dyn Sampler>> {
    let sampler = strum_core::audio::CpalSampler::open(frame_len)
        .context("Failed to start audio capture")?;
    Ok(Box::new(sampler))
}

#[cfg(not(feature = "capture"))]
fn open_microphone(_frame_len: usize) -> Result<Box<dyn Sampler>> {
    Err(anyhow!("Microphone input needs strum-cli built with --features capture"))
}

fn open_telemetry(path: Option<&PathBuf>, disabled: bool) -> Result<Box<dyn TelemetrySink>> {
    if disabled {
        return Ok(Box::new(NullSink));
    }
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create telemetry file {}", path.display()))?;
            Ok(Box::new(JsonLinesSink::new(file)))
        }
        None => Ok(Box::new(TracingSink)),
    }
}
