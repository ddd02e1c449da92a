//! Streaming audio playback with an explicit state machine
//!
//! ```text
//!            start()              pause()
//!  Stopped ──────────▶ Playing ──────────▶ Paused
//!     ▲                 ▲   │               │
//!     │                 │   │  resume() /   │
//!     │                 └───┼── start() ────┘
//!     │       stop()        │
//!     └─────────────────────┴── stop() ── (from Playing or Paused)
//! ```

use std::fmt;
use std::time::Duration;

use crate::audio::device::{AudioDevice, PcmFormat};
use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::protocol::AudioFrame;

/// Playback state of an [`AudioSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Audio output for decoded speech
pub struct AudioSink<D: AudioDevice> {
    device: D,
    format: PcmFormat,
    state: PlaybackState,
    /// Requested device buffer; raised to the device minimum on start
    requested_buffer_bytes: Option<usize>,
    buffer_bytes: usize,
    /// Reused decode buffer
    scratch: Vec<i16>,
    frames_written: u64,
    samples_written: u64,
    samples_flushed: u64,
}

impl<D: AudioDevice> AudioSink<D> {
    pub fn new(device: D, config: &AudioConfig) -> Self {
        let format = PcmFormat::SPEECH;
        Self {
            device,
            format,
            state: PlaybackState::Stopped,
            requested_buffer_bytes: config
                .device_buffer_ms
                .map(|ms| format.bytes_for(Duration::from_millis(ms as u64))),
            buffer_bytes: 0,
            scratch: Vec::new(),
            frames_written: 0,
            samples_written: 0,
            samples_flushed: 0,
        }
    }

    /// Acquire the device and begin playback, or resume a paused sink.
    pub fn start(&mut self) -> Result<(), AudioError> {
        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => self.resume(),
            PlaybackState::Stopped => {
                let min = self.device.min_buffer_size(&self.format)?;
                let buffer_bytes = self.requested_buffer_bytes.unwrap_or(0).max(min);
                tracing::debug!("Device buffer: {} bytes (minimum {})", buffer_bytes, min);

                self.device
                    .open(&self.format, buffer_bytes)
                    .map_err(Self::fatal)?;
                if let Err(e) = self.device.play() {
                    self.device.close();
                    return Err(Self::fatal(e));
                }

                self.buffer_bytes = buffer_bytes;
                self.state = PlaybackState::Playing;
                tracing::info!(
                    "Audio playback started ({} Hz mono, {:?} device buffer)",
                    self.format.sample_rate,
                    self.buffer_duration()
                );
                Ok(())
            }
        }
    }

    /// Continue after [`pause`](Self::pause)
    pub fn resume(&mut self) -> Result<(), AudioError> {
        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                self.device.play().map_err(Self::fatal)?;
                self.state = PlaybackState::Playing;
                tracing::debug!("Audio playback resumed");
                Ok(())
            }
            PlaybackState::Stopped => Err(self.invalid("resume")),
        }
    }

    /// Halt playback and discard everything queued on the device, so that
    /// resuming never plays stale audio.
    pub fn pause(&mut self) -> Result<(), AudioError> {
        match self.state {
            PlaybackState::Paused => Ok(()),
            PlaybackState::Playing => {
                self.device.pause()?;
                let dropped = self.device.flush();
                self.samples_flushed += dropped as u64;
                self.state = PlaybackState::Paused;
                tracing::debug!("Audio playback paused, {} samples discarded", dropped);
                Ok(())
            }
            PlaybackState::Stopped => Err(self.invalid("pause")),
        }
    }

    /// Discard queued audio and release the device. Stopping a stopped sink
    /// does nothing.
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Stopped {
            return;
        }
        let dropped = self.device.flush();
        self.samples_flushed += dropped as u64;
        self.device.close();
        self.state = PlaybackState::Stopped;
        tracing::info!(
            "Audio playback stopped after {} frames ({} samples discarded)",
            self.frames_written,
            dropped
        );
    }

    /// Write one frame, blocking while the device buffer is full.
    ///
    /// Only valid while playing.
    pub fn write(&mut self, frame: AudioFrame) -> Result<(), AudioError> {
        if self.state != PlaybackState::Playing {
            let err = self.invalid("write");
            tracing::error!("{}", err);
            return Err(err);
        }

        frame.copy_samples_into(&mut self.scratch);
        let accepted = self.device.write(&self.scratch)?;
        if accepted < self.scratch.len() {
            return Err(AudioError::StreamError(format!(
                "device accepted {} of {} samples",
                accepted,
                self.scratch.len()
            )));
        }

        self.frames_written += 1;
        self.samples_written += accepted as u64;
        Ok(())
    }

    fn invalid(&self, operation: &'static str) -> AudioError {
        AudioError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn fatal(err: AudioError) -> AudioError {
        match err {
            AudioError::DeviceUnavailable(_) => err,
            other => AudioError::DeviceUnavailable(other.to_string()),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn format(&self) -> &PcmFormat {
        &self.format
    }

    /// Playback time the device buffer holds; zero until started
    pub fn buffer_duration(&self) -> Duration {
        self.format.duration_of(self.buffer_bytes)
    }

    pub fn underrun_count(&self) -> u64 {
        self.device.underrun_count()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Samples discarded by pause/stop before they were rendered
    pub fn samples_flushed(&self) -> u64 {
        self.samples_flushed
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: AudioDevice> Drop for AudioSink<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::SoftwareDevice;

    fn sink(min_bytes: usize) -> (AudioSink<SoftwareDevice>, crate::audio::RenderHandle) {
        let (device, render) = SoftwareDevice::new(min_bytes);
        (AudioSink::new(device, &AudioConfig::default()), render)
    }

    #[test]
    fn test_write_while_stopped_fails() {
        let (mut sink, _render) = sink(640);
        let err = sink.write(AudioFrame::from_samples(&[1; 10])).unwrap_err();
        assert_eq!(
            err,
            AudioError::InvalidState {
                operation: "write",
                state: PlaybackState::Stopped
            }
        );
    }

    #[test]
    fn test_state_transitions() {
        let (mut sink, render) = sink(640);
        assert_eq!(sink.state(), PlaybackState::Stopped);

        sink.start().unwrap();
        assert_eq!(sink.state(), PlaybackState::Playing);
        assert!(render.is_playing());
        assert_eq!(sink.buffer_duration(), Duration::from_millis(40));

        sink.pause().unwrap();
        assert_eq!(sink.state(), PlaybackState::Paused);
        assert!(sink.write(AudioFrame::from_samples(&[1])).is_err());

        sink.start().unwrap();
        assert_eq!(sink.state(), PlaybackState::Playing);

        sink.stop();
        assert_eq!(sink.state(), PlaybackState::Stopped);
        assert!(!render.is_playing());
    }

    #[test]
    fn test_pause_and_resume_invalid_when_stopped() {
        let (mut sink, _render) = sink(640);
        assert!(matches!(
            sink.pause(),
            Err(AudioError::InvalidState { operation: "pause", .. })
        ));
        assert!(matches!(
            sink.resume(),
            Err(AudioError::InvalidState { operation: "resume", .. })
        ));
        sink.stop();
    }

    #[test]
    fn test_pause_discards_queued_audio() {
        let (mut sink, render) = sink(640);
        sink.start().unwrap();
        sink.write(AudioFrame::from_samples(&[1; 100])).unwrap();

        sink.pause().unwrap();
        assert_eq!(sink.samples_flushed(), 100);
        sink.resume().unwrap();
        sink.write(AudioFrame::from_samples(&[2; 50])).unwrap();

        let played = render.render(200);
        assert_eq!(played, vec![2; 50]);
    }

    #[test]
    fn test_configured_buffer_above_minimum() {
        let (device, _render) = SoftwareDevice::new(64);
        let config = AudioConfig {
            device_buffer_ms: Some(100),
            ..AudioConfig::default()
        };
        let mut sink = AudioSink::new(device, &config);
        sink.start().unwrap();
        assert_eq!(sink.buffer_duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_unavailable_device_stays_stopped() {
        let mut sink = AudioSink::new(
            SoftwareDevice::unavailable("no output"),
            &AudioConfig::default(),
        );
        assert!(matches!(
            sink.start(),
            Err(AudioError::DeviceUnavailable(_))
        ));
        assert_eq!(sink.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_counts_frames() {
        let (mut sink, _render) = sink(640);
        sink.start().unwrap();
        sink.write(AudioFrame::from_samples(&[0; 80])).unwrap();
        sink.write(AudioFrame::from_samples(&[0; 80])).unwrap();
        assert_eq!(sink.frames_written(), 2);
        assert_eq!(sink.samples_written(), 160);
    }
}
