//! Headless FreeDV monitor
//!
//! Runs a synthetic decoder into a session, plays the audio and repaints the
//! charts into draw lists at the render rate, logging relay health.
//!
//! Usage: `freedv-monitor [config.toml] [seconds]`

use anyhow::{Context, Result};
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use freedv_relay::audio::AudioDevice;
use freedv_relay::config::AppConfig;
use freedv_relay::constants::{SAMPLE_RATE_HZ, STATS_LEN, SYMBOL_COUNT};
use freedv_relay::protocol::AudioFrame;
use freedv_relay::relay::RelayProducer;
use freedv_relay::render::{
    vertical_axis_labels, ChartRenderer, ScatterRenderer, SeriesStyle, Viewport,
};
use freedv_relay::session::{Decoder, Session};

/// Samples per decoded speech frame (20 ms)
const FRAME_SAMPLES: usize = 160;
const FRAME_PERIOD: Duration = Duration::from_millis(20);
/// Modem statistics arrive once per two speech frames
const FRAMES_PER_STATS: u64 = 2;
const TICK_PERIOD: Duration = Duration::from_millis(20);
const STATS_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_RUN_TIME: Duration = Duration::from_secs(30);

/// Stand-in for the native modem: a tone, drifting offsets and a sync flag
/// that drops out now and then.
struct SyntheticDecoder {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl SyntheticDecoder {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    fn run(producer: RelayProducer, running: Arc<AtomicBool>) -> u64 {
        let mut frames = 0u64;
        let mut phase = 0f32;
        let step = TAU * 440.0 / SAMPLE_RATE_HZ as f32;
        let mut stats = [0f32; STATS_LEN];
        let mut next = Instant::now();

        while running.load(Ordering::Relaxed) {
            let samples: Vec<i16> = (0..FRAME_SAMPLES)
                .map(|_| {
                    phase = (phase + step) % TAU;
                    (phase.sin() * 8000.0) as i16
                })
                .collect();
            if producer.publish_audio(AudioFrame::from_samples(&samples)).is_err() {
                break;
            }

            if frames % FRAMES_PER_STATS == 0 {
                let t = frames as f32 * 0.02;
                stats[0] = 12.0 * (t * 0.3).sin() + (t * 7.0).sin();
                stats[1] = 4.0 * (t * 0.11).cos();
                for (i, symbol) in stats[2..].chunks_exact_mut(2).take(SYMBOL_COUNT).enumerate() {
                    let angle = TAU / 4.0 * (frames as usize + i) as f32 + TAU / 8.0;
                    let noise = 0.1 * ((t + i as f32) * 13.0).sin();
                    symbol[0] = 300.0 * (angle.cos() + noise);
                    symbol[1] = 300.0 * (angle.sin() - noise);
                }
                if producer.publish_stats(&stats).is_err() {
                    break;
                }
                // out of sync for one second in every ten
                let in_sync = (frames / 50) % 10 != 9;
                if producer.publish_sync(in_sync).is_err() {
                    break;
                }
            }

            frames += 1;
            next += FRAME_PERIOD;
            if let Some(wait) = next.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
        }
        frames
    }
}

impl Decoder for SyntheticDecoder {
    fn start(&mut self, producer: RelayProducer) -> bool {
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        match thread::Builder::new()
            .name("synthetic-decoder".into())
            .spawn(move || Self::run(producer, running))
        {
            Ok(handle) => {
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                tracing::error!("Failed to spawn decoder thread: {}", e);
                self.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    fn stop(&mut self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        match self.handle.take().map(|handle| handle.join()) {
            Some(Ok(frames)) => {
                tracing::info!("Decoder stopped after {} frames", frames);
                true
            }
            Some(Err(_)) => {
                tracing::error!("Decoder thread panicked");
                false
            }
            None => false,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FreeDV monitor");

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from).or_else(AppConfig::default_path);
    let run_time = match args.next() {
        Some(secs) => Duration::from_secs(secs.parse().context("run time must be whole seconds")?),
        None => DEFAULT_RUN_TIME,
    };

    let config = match &config_path {
        Some(path) => AppConfig::load_or_default(path)?,
        None => AppConfig::default(),
    };

    run_with_device(config, run_time)
}

#[cfg(feature = "cpal")]
fn run_with_device(config: AppConfig, run_time: Duration) -> Result<()> {
    let device = match &config.audio.device_name {
        Some(name) => freedv_relay::audio::CpalDevice::by_name(name)?,
        None => freedv_relay::audio::CpalDevice::default_output()?,
    };
    tracing::info!("Output device: {}", device.name);
    run(config, device, run_time)
}

#[cfg(not(feature = "cpal"))]
fn run_with_device(config: AppConfig, run_time: Duration) -> Result<()> {
    // 40 ms minimum device buffer, drained in real time by a pacing thread
    let (device, render) = freedv_relay::audio::SoftwareDevice::new(640);
    let _renderer = render.spawn_realtime(SAMPLE_RATE_HZ, FRAME_SAMPLES / 2)?;
    tracing::info!("Output device: software renderer");
    run(config, device, run_time)
}

fn run<A: AudioDevice>(config: AppConfig, device: A, run_time: Duration) -> Result<()> {
    let chart_viewport = Viewport::new(480.0, 240.0, config.charts.border_px);
    let scatter_viewport = Viewport::new(240.0, 240.0, 0.0);
    let frequency_chart = ChartRenderer::new(SeriesStyle::frequency_offset())
        .with_fill_under(config.charts.fill_under);
    let timing_chart =
        ChartRenderer::new(SeriesStyle::timing_offset()).with_fill_under(config.charts.fill_under);
    let scatter = ScatterRenderer::new(config.scatter.scale).with_radius(config.scatter.point_radius);
    let label_spacing = config.charts.label_spacing_px;

    let mut session = Session::new(config, SyntheticDecoder::new(), device);
    session.start()?;

    let started = Instant::now();
    let mut last_stats_time = Instant::now();
    let mut next_tick = Instant::now();

    while started.elapsed() < run_time {
        let report = session.tick()?;
        for warning in &report.warnings {
            tracing::debug!("Health: {}", warning);
        }

        let view = session.view();
        let commands = frequency_chart
            .render_buffer(view.frequency_offset(), chart_viewport)
            .len()
            + timing_chart
                .render_buffer(view.timing_offset(), chart_viewport)
                .len()
            + scatter.render_buffer(view.scatter(), scatter_viewport).len();
        let bounds = view.frequency_offset().current_bounds();
        let labels = vertical_axis_labels(
            bounds.min_y,
            bounds.max_y,
            chart_viewport.plot_height(),
            label_spacing,
        );
        tracing::trace!(
            "Repainted {} draw commands, frequency axis {} .. {}",
            commands,
            labels.first().map_or("", |l| l.text.as_str()),
            labels.last().map_or("", |l| l.text.as_str())
        );

        if last_stats_time.elapsed() >= STATS_INTERVAL {
            let stats = session.stats();
            if let Some(health) = session.health() {
                tracing::info!(
                    "Frames: {} played, {} discarded | queue {:.0}% | underruns {} | freq [{:.1}, {:.1}] Hz | scatter level {:.3} | {}",
                    stats.audio_frames,
                    stats.audio_discarded,
                    health.fill_level() * 100.0,
                    stats.underruns,
                    bounds.min_y,
                    bounds.max_y,
                    view.scatter().filter_level(),
                    if session.in_sync() { "sync" } else { "no sync" }
                );
            }
            last_stats_time = Instant::now();
        }

        next_tick += TICK_PERIOD;
        if let Some(wait) = next_tick.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    session.stop()?;
    tracing::info!("Monitor finished");
    Ok(())
}
