//! Consumer-side session controller
//!
//! Owns the audio sink, the diagnostics view and the consumer end of the
//! relay. Everything here runs on the consumer thread; the decoder only ever
//! sees a [`RelayProducer`].

use uuid::Uuid;

use crate::audio::{AudioDevice, AudioSink, PlaybackState};
use crate::config::AppConfig;
use crate::error::{MailboxKind, SessionError, Warning};
use crate::relay::{self, RelayConsumer, RelayEvent, RelayHealth, RelayProducer};
use crate::stats::DiagnosticsView;

/// The external decoder driving a session.
///
/// `start` receives the producer endpoint and returns whether decoding began.
/// Once `stop` returns the decoder must not publish again.
pub trait Decoder {
    fn start(&mut self, producer: RelayProducer) -> bool;
    fn stop(&mut self) -> bool;
}

/// What one [`Session::tick`] did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Frames written to the audio sink
    pub audio_frames: usize,
    /// Frames dropped because playback was paused
    pub audio_discarded: usize,
    pub diagnostics: usize,
    /// Newest sync flag, if one arrived this tick
    pub sync: Option<bool>,
    pub warnings: Vec<Warning>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.audio_frames == 0
            && self.audio_discarded == 0
            && self.diagnostics == 0
            && self.sync.is_none()
            && self.warnings.is_empty()
    }
}

/// Running totals for the current session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub ticks: u64,
    pub audio_frames: u64,
    pub audio_discarded: u64,
    pub diagnostics: u64,
    pub underruns: u64,
    pub overflows: u64,
}

/// Tracks relay and device counters between ticks
#[derive(Debug, Default)]
struct Watermarks {
    device_underruns: u64,
    diagnostics_overwritten: u64,
    sync_overwritten: u64,
}

pub struct Session<D: Decoder, A: AudioDevice> {
    config: AppConfig,
    decoder: D,
    sink: AudioSink<A>,
    view: DiagnosticsView,
    relay: Option<RelayConsumer>,
    id: Option<Uuid>,
    in_sync: bool,
    /// Reused drain buffer
    events: Vec<RelayEvent>,
    watermarks: Watermarks,
    stats: SessionStats,
}

impl<D: Decoder, A: AudioDevice> Session<D, A> {
    pub fn new(config: AppConfig, decoder: D, device: A) -> Self {
        let sink = AudioSink::new(device, &config.audio);
        let view = DiagnosticsView::new(&config);
        Self {
            config,
            decoder,
            sink,
            view,
            relay: None,
            id: None,
            in_sync: false,
            events: Vec::new(),
            watermarks: Watermarks::default(),
            stats: SessionStats::default(),
        }
    }

    /// Open the audio device, build a fresh relay and start the decoder.
    ///
    /// A device failure is fatal and leaves the decoder untouched.
    pub fn start(&mut self) -> Result<Uuid, SessionError> {
        if self.relay.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        self.sink.start()?;

        let (producer, consumer) = relay::channel(&self.config.relay, self.sink.buffer_duration());
        if !self.decoder.start(producer) {
            tracing::error!("Decoder refused to start");
            drop(consumer);
            self.sink.stop();
            return Err(SessionError::DecoderRefused);
        }

        let id = Uuid::new_v4();
        tracing::info!(
            "Session {} started (underrun budget {:?})",
            id,
            consumer.underrun_budget()
        );
        self.relay = Some(consumer);
        self.id = Some(id);
        self.watermarks = Watermarks {
            device_underruns: self.sink.underrun_count(),
            ..Watermarks::default()
        };
        self.stats = SessionStats::default();
        Ok(id)
    }

    /// Drain the relay once and dispatch everything it held.
    ///
    /// A failed device write is fatal: the session is torn down and the
    /// error returned.
    pub fn tick(&mut self) -> Result<TickReport, SessionError> {
        let relay = self.relay.as_mut().ok_or(SessionError::NotRunning)?;

        let mut events = std::mem::take(&mut self.events);
        relay.drain_into(&mut events);
        let health = relay.health();

        let mut report = TickReport::default();
        let mut failure = None;
        for event in events.drain(..) {
            match event {
                RelayEvent::Audio(frame) => match self.sink.state() {
                    PlaybackState::Playing => {
                        if let Err(e) = self.sink.write(frame) {
                            failure = Some(e);
                            break;
                        }
                        report.audio_frames += 1;
                    }
                    _ => report.audio_discarded += 1,
                },
                RelayEvent::Diagnostics(sample) => {
                    self.view.record(sample);
                    report.diagnostics += 1;
                }
                RelayEvent::Sync(flag) => {
                    if flag != self.in_sync {
                        tracing::info!("Modem {}", if flag { "in sync" } else { "lost sync" });
                    }
                    self.in_sync = flag;
                    report.sync = Some(flag);
                }
                RelayEvent::Health(warning) => report.warnings.push(warning),
            }
        }
        self.events = events;

        if let Some(e) = failure {
            tracing::error!("Audio write failed, stopping session: {}", e);
            self.teardown();
            return Err(SessionError::from(e));
        }
        relay.mark_dispatched();

        let device_underruns = self.sink.underrun_count();
        if device_underruns > self.watermarks.device_underruns {
            let warning = Warning::DeviceUnderrun {
                count: device_underruns - self.watermarks.device_underruns,
            };
            tracing::warn!("{} since the last tick", warning);
            report.warnings.push(warning);
        }
        self.watermarks.device_underruns = device_underruns;
        self.note_overflows(&health, &mut report);

        self.stats.ticks += 1;
        self.stats.audio_frames += report.audio_frames as u64;
        self.stats.audio_discarded += report.audio_discarded as u64;
        self.stats.diagnostics += report.diagnostics as u64;
        for warning in &report.warnings {
            match warning {
                Warning::BufferUnderrun { .. } => self.stats.underruns += 1,
                Warning::DeviceUnderrun { count } => self.stats.underruns += count,
                Warning::RelayOverflow { .. } => self.stats.overflows += 1,
            }
        }

        Ok(report)
    }

    fn note_overflows(&mut self, health: &RelayHealth, report: &mut TickReport) {
        let marks = &mut self.watermarks;
        for (channel, now, seen) in [
            (
                MailboxKind::Diagnostics,
                health.diagnostics_overwritten,
                &mut marks.diagnostics_overwritten,
            ),
            (MailboxKind::Sync, health.sync_overwritten, &mut marks.sync_overwritten),
        ] {
            if now > *seen {
                let warning = Warning::RelayOverflow {
                    channel,
                    overwritten: now - *seen,
                };
                tracing::debug!("{}", warning);
                report.warnings.push(warning);
                *seen = now;
            }
        }
    }

    /// Pause playback, discarding audio queued on the device
    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.relay.is_none() {
            return Err(SessionError::NotRunning);
        }
        self.sink.pause()?;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.relay.is_none() {
            return Err(SessionError::NotRunning);
        }
        self.sink.resume()?;
        Ok(())
    }

    /// Tear the session down: the decoder stops publishing, in-flight audio
    /// is discarded, the device is released and all chart state is cleared.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if self.relay.is_none() {
            return Err(SessionError::NotRunning);
        }
        self.teardown();
        Ok(())
    }

    fn teardown(&mut self) {
        let Some(mut relay) = self.relay.take() else {
            return;
        };

        relay.reject_publishes();
        if !self.decoder.stop() {
            tracing::warn!("Decoder reported a failed stop");
        }
        let discarded = relay.close();
        self.sink.stop();
        self.view.clear();
        self.in_sync = false;
        self.events.clear();

        tracing::info!(
            "Session {} stopped: {} frames played, {} discarded in flight, {} underruns",
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.stats.audio_frames,
            discarded,
            self.stats.underruns
        );
        self.id = None;
    }

    pub fn is_running(&self) -> bool {
        self.relay.is_some()
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn in_sync(&self) -> bool {
        self.in_sync
    }

    pub fn view(&self) -> &DiagnosticsView {
        &self.view
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.sink.state()
    }

    pub fn sink(&self) -> &AudioSink<A> {
        &self.sink
    }

    pub fn health(&self) -> Option<RelayHealth> {
        self.relay.as_ref().map(|relay| relay.health())
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

}

impl<D: Decoder, A: AudioDevice> Drop for Session<D, A> {
    fn drop(&mut self) {
        self.teardown();
    }
}
