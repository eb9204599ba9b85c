use anyhow::{Context, Result};
use clap::Parser;
use hr_session::channels::QueuedUploader;
use hr_session::config::{ClockMode, OutputMode, SessionConfig, SourceMode};
use hr_session::output;
use hr_session::scheduler::LogPins;
use hr_session::session;
use hr_session::source::{FlatLine, SampleSource, SyntheticPulse};
use hr_session::time::{Clock, SimulatedClock, SystemClock};
use thingbuf::mpsc::channel;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "log")]
    output: OutputMode,

    #[arg(long, default_value = "synthetic")]
    source: SourceMode,

    #[arg(long, default_value = "realtime")]
    clock: ClockMode,

    /// Pulse rate of the synthetic source
    #[arg(long, default_value_t = 72.0)]
    synthetic_bpm: f32,

    /// Level of the flat source
    #[arg(long, default_value_t = 512)]
    flat_level: u16,

    /// Counter value at session start
    #[arg(long, default_value_t = 0)]
    clock_offset_ms: u32,

    /// Pending uploads before new ones are dropped
    #[arg(long, default_value_t = 16)]
    upload_queue: usize,

    #[command(flatten)]
    session: SessionConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::builder().init();

    log::info!("Starting hr_session");
    log::info!("Output mode: {:?}", cli.output);
    log::info!("Source: {:?}, clock: {:?}", cli.source, cli.clock);

    cli.session
        .validate()
        .context("Invalid session configuration")?;
    if !(cli.synthetic_bpm.is_finite() && cli.synthetic_bpm > 0.0) {
        anyhow::bail!("Synthetic BPM must be positive, got {}", cli.synthetic_bpm);
    }
    if cli.upload_queue == 0 {
        anyhow::bail!("Upload queue needs room for at least one request");
    }

    let (request_tx, request_rx) = channel(cli.upload_queue);
    let (outcome_tx, outcome_rx) = channel(cli.upload_queue);
    let uploader_task = tokio::spawn(output::run_uploader(cli.output, request_rx, outcome_tx));
    let uploader = QueuedUploader {
        requests: request_tx,
        outcomes: outcome_rx,
    };

    let source: Box<dyn SampleSource + Send> = match cli.source {
        SourceMode::Synthetic => Box::new(SyntheticPulse::new(
            cli.synthetic_bpm,
            cli.session.sample_period_ms,
        )),
        SourceMode::Flat => Box::new(FlatLine(cli.flat_level)),
    };
    let mut clock: Box<dyn Clock + Send> = match cli.clock {
        ClockMode::Realtime => Box::new(SystemClock::with_offset(cli.clock_offset_ms)),
        ClockMode::Simulated => Box::new(SimulatedClock::new(cli.clock_offset_ms, 1)),
    };

    let config = cli.session;
    let summary = tokio::task::spawn_blocking(move || {
        session::run(config, clock.as_mut(), source, LogPins::default(), uploader)
    })
    .await
    .context("Measurement thread failed")??;

    let handled = uploader_task.await.context("Upload task failed")?;

    log::info!(
        "Done. {} summary sample(s), {} upload(s) handled",
        summary.samples.len(),
        handled
    );

    Ok(())
}
