//! Producer and consumer endpoints of the relay

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};

use crate::config::RelayConfig;
use crate::error::{RelayError, Warning};
use crate::protocol::{AudioFrame, DiagnosticSample, SampleEnvelope};
use crate::relay::mailbox::Mailbox;

/// How often a producer waiting on a full queue re-checks for shutdown
const SEND_POLL: Duration = Duration::from_millis(20);

/// State visible to both threads
struct Shared {
    diagnostics: Mailbox<DiagnosticSample>,
    sync: Mailbox<bool>,
    closed: AtomicBool,
    audio_published: AtomicU64,
    audio_backpressure: AtomicU64,
}

/// Create a connected producer/consumer pair.
///
/// `device_budget` is how long the audio device can play from its own
/// buffer; it is used as the underrun threshold unless the config sets one.
pub fn channel(config: &RelayConfig, device_budget: Duration) -> (RelayProducer, RelayConsumer) {
    let (audio_tx, audio_rx) = bounded(config.audio_queue_capacity.max(1));
    let shared = Arc::new(Shared {
        diagnostics: Mailbox::new(),
        sync: Mailbox::new(),
        closed: AtomicBool::new(false),
        audio_published: AtomicU64::new(0),
        audio_backpressure: AtomicU64::new(0),
    });

    let producer = RelayProducer {
        audio_tx,
        shared: shared.clone(),
    };
    let consumer = RelayConsumer {
        audio_rx: Some(audio_rx),
        audio_capacity: config.audio_queue_capacity.max(1),
        shared,
        underrun_budget: config.underrun_budget().unwrap_or(device_budget),
        last_drain: None,
        underruns: 0,
    };
    (producer, consumer)
}

/// Decoder-side endpoint. Exactly one exists per relay.
pub struct RelayProducer {
    audio_tx: Sender<AudioFrame>,
    shared: Arc<Shared>,
}

impl RelayProducer {
    /// Queue a decoded audio frame.
    ///
    /// Never drops the frame. Returns immediately unless the queue is full,
    /// in which case it waits for the consumer to make room.
    pub fn publish_audio(&self, frame: AudioFrame) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::Closed);
        }

        match self.audio_tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                let waits = self.shared.audio_backpressure.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!("Audio queue full, producer waiting (wait #{})", waits);
                let mut pending = frame;
                loop {
                    match self.audio_tx.send_timeout(pending, SEND_POLL) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(frame)) => {
                            if self.is_closed() {
                                return Err(RelayError::Closed);
                            }
                            pending = frame;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => return Err(RelayError::Closed),
                    }
                }
            }
            Err(TrySendError::Disconnected(_)) => return Err(RelayError::Closed),
        }

        self.shared.audio_published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Replace the pending diagnostics snapshot. Never blocks.
    pub fn publish_diagnostics(&self, sample: DiagnosticSample) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::Closed);
        }
        if self.shared.diagnostics.publish(sample) {
            tracing::trace!("Unread diagnostics replaced");
        }
        Ok(())
    }

    /// Parse and publish a flat statistics report from the decoder.
    pub fn publish_stats(&self, stats: &[f32]) -> Result<(), RelayError> {
        self.publish_diagnostics(DiagnosticSample::from_stats(stats)?)
    }

    /// Replace the pending sync flag. Never blocks.
    pub fn publish_sync(&self, in_sync: bool) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::Closed);
        }
        if self.shared.sync.publish(in_sync) {
            tracing::trace!("Unread sync flag replaced");
        }
        Ok(())
    }

    pub fn publish(&self, envelope: SampleEnvelope) -> Result<(), RelayError> {
        match envelope {
            SampleEnvelope::Audio(frame) => self.publish_audio(frame),
            SampleEnvelope::Diagnostics(sample) => self.publish_diagnostics(sample),
            SampleEnvelope::Sync(flag) => self.publish_sync(flag),
        }
    }

    /// Whether the consumer has torn the relay down
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

/// One item handed to the consumer by [`RelayConsumer::drain`]
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Audio(AudioFrame),
    Diagnostics(DiagnosticSample),
    Sync(bool),
    Health(Warning),
}

/// Snapshot of the relay's buffer health
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayHealth {
    pub queued_audio: usize,
    pub audio_capacity: usize,
    pub audio_published: u64,
    /// Times the producer had to wait on a full audio queue
    pub audio_backpressure: u64,
    /// Drains that came later than the device could absorb
    pub underruns: u64,
    pub diagnostics_overwritten: u64,
    pub sync_overwritten: u64,
}

impl RelayHealth {
    pub fn fill_level(&self) -> f32 {
        if self.audio_capacity == 0 {
            0.0
        } else {
            self.queued_audio as f32 / self.audio_capacity as f32
        }
    }
}

/// Consumer-side endpoint, driven once per render/audio tick
pub struct RelayConsumer {
    /// Dropped on close so a producer blocked on a full queue wakes up
    audio_rx: Option<Receiver<AudioFrame>>,
    audio_capacity: usize,
    shared: Arc<Shared>,
    underrun_budget: Duration,
    last_drain: Option<Instant>,
    underruns: u64,
}

impl RelayConsumer {
    /// Collect everything pending: all queued audio in publish order, then
    /// the newest sync flag and diagnostics if any arrived.
    pub fn drain(&mut self) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        self.drain_into(&mut events);
        events
    }

    /// Like [`drain`](Self::drain) but appends to `events`. Returns the
    /// number of events added.
    pub fn drain_into(&mut self, events: &mut Vec<RelayEvent>) -> usize {
        let start = events.len();
        let Some(audio_rx) = self.audio_rx.as_ref() else {
            return 0;
        };

        let now = Instant::now();
        if let Some(last) = self.last_drain {
            let stalled_for = now.duration_since(last);
            let streaming = self.shared.audio_published.load(Ordering::Relaxed) > 0;
            if streaming && stalled_for > self.underrun_budget {
                self.underruns += 1;
                tracing::warn!(
                    "Relay drained {:?} after the previous dispatch (budget {:?})",
                    stalled_for,
                    self.underrun_budget
                );
                events.push(RelayEvent::Health(Warning::BufferUnderrun { stalled_for }));
            }
        }
        self.last_drain = Some(now);

        events.extend(audio_rx.try_iter().map(RelayEvent::Audio));
        if let Some(flag) = self.shared.sync.take() {
            events.push(RelayEvent::Sync(flag));
        }
        if let Some(sample) = self.shared.diagnostics.take() {
            events.push(RelayEvent::Diagnostics(sample));
        }

        events.len() - start
    }

    /// Restart the lateness clock once drained audio has been handed to the
    /// device. Time spent blocked on a full device buffer is pacing, not a
    /// late drain.
    pub fn mark_dispatched(&mut self) {
        if self.last_drain.is_some() {
            self.last_drain = Some(Instant::now());
        }
    }

    pub fn health(&self) -> RelayHealth {
        RelayHealth {
            queued_audio: self.audio_rx.as_ref().map_or(0, |rx| rx.len()),
            audio_capacity: self.audio_capacity,
            audio_published: self.shared.audio_published.load(Ordering::Relaxed),
            audio_backpressure: self.shared.audio_backpressure.load(Ordering::Relaxed),
            underruns: self.underruns,
            diagnostics_overwritten: self.shared.diagnostics.overwritten_count(),
            sync_overwritten: self.shared.sync.overwritten_count(),
        }
    }

    pub fn underrun_budget(&self) -> Duration {
        self.underrun_budget
    }

    /// Make every further publish fail with [`RelayError::Closed`] without
    /// discarding what is already queued. A producer waiting on a full queue
    /// gives up within one poll interval.
    pub fn reject_publishes(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    /// Stop accepting publishes and discard everything in flight.
    ///
    /// Returns the number of audio frames that were discarded.
    pub fn close(&mut self) -> usize {
        self.shared.closed.store(true, Ordering::Release);
        let discarded = self
            .audio_rx
            .take()
            .map_or(0, |rx| rx.try_iter().count());
        self.shared.diagnostics.clear();
        self.shared.sync.clear();
        if discarded > 0 {
            tracing::debug!("Relay closed, discarded {} queued audio frames", discarded);
        }
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.audio_rx.is_none()
    }
}

impl Drop for RelayConsumer {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}
