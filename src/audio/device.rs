//! Output device abstraction and the in-memory software device

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::buffer::{PcmRingBuffer, SharedPcmBuffer};
use crate::constants::{BYTES_PER_SAMPLE, CHANNELS, SAMPLE_RATE_HZ};
use crate::error::AudioError;

/// Speaker arrangement of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
}

impl ChannelLayout {
    pub fn channels(&self) -> u16 {
        match self {
            ChannelLayout::Mono => CHANNELS,
        }
    }
}

/// Encoding of a single PCM sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    I16,
}

impl SampleFormat {
    pub fn bytes(&self) -> usize {
        match self {
            SampleFormat::I16 => BYTES_PER_SAMPLE,
        }
    }
}

/// Stream format handed to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channel_layout: ChannelLayout,
    pub sample_format: SampleFormat,
}

impl PcmFormat {
    /// Decoded speech: 8 kHz, mono, 16-bit
    pub const SPEECH: PcmFormat = PcmFormat {
        sample_rate: SAMPLE_RATE_HZ,
        channel_layout: ChannelLayout::Mono,
        sample_format: SampleFormat::I16,
    };

    pub fn bytes_per_frame(&self) -> usize {
        self.channel_layout.channels() as usize * self.sample_format.bytes()
    }

    /// Bytes needed to hold `duration` of audio
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let frames = (self.sample_rate as u128 * duration.as_micros()) / 1_000_000;
        frames as usize * self.bytes_per_frame()
    }

    /// Playback time represented by `bytes`
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let frames = (bytes / self.bytes_per_frame()) as u64;
        Duration::from_micros(frames * 1_000_000 / self.sample_rate as u64)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::SPEECH
    }
}

/// A streaming PCM output.
///
/// Only the consumer thread calls into a device; the device may render from
/// its own thread.
pub trait AudioDevice {
    /// Smallest buffer, in bytes, the device accepts for `format`
    fn min_buffer_size(&self, format: &PcmFormat) -> Result<usize, AudioError>;

    /// Acquire the device with a buffer of `buffer_bytes`
    fn open(&mut self, format: &PcmFormat, buffer_bytes: usize) -> Result<(), AudioError>;

    /// Start or resume rendering
    fn play(&mut self) -> Result<(), AudioError>;

    /// Stop rendering, keeping buffered samples
    fn pause(&mut self) -> Result<(), AudioError>;

    /// Discard samples not yet rendered. Returns how many were dropped.
    fn flush(&mut self) -> usize;

    /// Queue samples, blocking while the device buffer is full
    fn write(&mut self, samples: &[i16]) -> Result<usize, AudioError>;

    /// Release the device
    fn close(&mut self);

    /// Times the device ran out of samples while playing
    fn underrun_count(&self) -> u64;
}

/// State shared between a [`SoftwareDevice`] and its [`RenderHandle`]
#[derive(Default)]
struct SoftwareShared {
    buffer: RwLock<Option<SharedPcmBuffer>>,
    playing: AtomicBool,
}

/// In-memory output device.
///
/// Samples written to it are consumed through a [`RenderHandle`], either on
/// demand (tests) or from a real-time pacing thread.
pub struct SoftwareDevice {
    shared: Arc<SoftwareShared>,
    min_buffer_bytes: usize,
    unavailable: Option<String>,
}

impl SoftwareDevice {
    /// Device with a minimum buffer of `min_buffer_bytes`
    pub fn new(min_buffer_bytes: usize) -> (Self, RenderHandle) {
        let shared = Arc::new(SoftwareShared::default());
        let device = Self {
            shared: shared.clone(),
            min_buffer_bytes: min_buffer_bytes.max(BYTES_PER_SAMPLE),
            unavailable: None,
        };
        (device, RenderHandle { shared })
    }

    /// Device that refuses to open, for exercising failure paths
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(SoftwareShared::default()),
            min_buffer_bytes: BYTES_PER_SAMPLE,
            unavailable: Some(reason.into()),
        }
    }

    fn buffer(&self) -> Result<SharedPcmBuffer, AudioError> {
        self.shared
            .buffer
            .read()
            .clone()
            .ok_or_else(|| AudioError::StreamError("device is not open".into()))
    }
}

impl AudioDevice for SoftwareDevice {
    fn min_buffer_size(&self, format: &PcmFormat) -> Result<usize, AudioError> {
        if *format != PcmFormat::SPEECH {
            return Err(AudioError::UnsupportedFormat(format!("{:?}", format)));
        }
        Ok(self.min_buffer_bytes)
    }

    fn open(&mut self, format: &PcmFormat, buffer_bytes: usize) -> Result<(), AudioError> {
        if let Some(reason) = &self.unavailable {
            return Err(AudioError::DeviceUnavailable(reason.clone()));
        }
        let samples = buffer_bytes / format.bytes_per_frame();
        *self.shared.buffer.write() = Some(Arc::new(PcmRingBuffer::new(samples)));
        tracing::debug!("Software device opened with {} sample buffer", samples);
        Ok(())
    }

    fn play(&mut self) -> Result<(), AudioError> {
        self.buffer()?;
        self.shared.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        self.shared.playing.store(false, Ordering::Release);
        Ok(())
    }

    fn flush(&mut self) -> usize {
        self.buffer().map_or(0, |buffer| buffer.clear())
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize, AudioError> {
        self.buffer()?.write_to_device(samples)
    }

    fn close(&mut self) {
        self.shared.playing.store(false, Ordering::Release);
        if let Some(buffer) = self.shared.buffer.write().take() {
            buffer.close();
        }
    }

    fn underrun_count(&self) -> u64 {
        self.buffer().map_or(0, |buffer| buffer.underrun_count())
    }
}

/// Render side of a [`SoftwareDevice`]
#[derive(Clone)]
pub struct RenderHandle {
    shared: Arc<SoftwareShared>,
}

impl RenderHandle {
    /// Render up to `count` samples. A paused or closed device renders nothing;
    /// a playing device that runs dry pads with silence.
    pub fn render(&self, count: usize) -> Vec<i16> {
        let mut out = vec![0i16; count];
        let rendered = self.render_into(&mut out);
        out.truncate(rendered);
        out
    }

    /// Fill `out` as a device callback would. Returns the real samples copied.
    pub fn render_into(&self, out: &mut [i16]) -> usize {
        if !self.shared.playing.load(Ordering::Acquire) {
            out.fill(0);
            return 0;
        }
        match self.shared.buffer.read().as_ref() {
            Some(buffer) => buffer.read_into(out),
            None => {
                out.fill(0);
                0
            }
        }
    }

    /// Simulate losing the output: any blocked or later write fails with
    /// [`AudioError::DeviceUnavailable`].
    pub fn disconnect(&self, reason: &str) {
        self.shared.playing.store(false, Ordering::Release);
        if let Some(buffer) = self.shared.buffer.read().as_ref() {
            buffer.fail(reason);
        }
    }

    /// Samples waiting to be rendered
    pub fn pending(&self) -> usize {
        self.shared.buffer.read().as_ref().map_or(0, |b| b.len())
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    /// Consume samples at `sample_rate` from a background thread, in
    /// `chunk` sized pulls, until the returned renderer is dropped.
    pub fn spawn_realtime(
        self,
        sample_rate: u32,
        chunk: usize,
    ) -> Result<RealtimeRenderer, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let period = Duration::from_micros(chunk as u64 * 1_000_000 / sample_rate.max(1) as u64);

        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name("software-audio-render".into())
            .spawn(move || {
                let mut scratch = vec![0i16; chunk.max(1)];
                while thread_running.load(Ordering::Relaxed) {
                    self.render_into(&mut scratch);
                    thread::sleep(period);
                }
            })
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        Ok(RealtimeRenderer {
            running,
            handle: Some(handle),
        })
    }
}

/// Background pacing thread for a [`SoftwareDevice`]
pub struct RealtimeRenderer {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RealtimeRenderer {
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RealtimeRenderer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_format() {
        let format = PcmFormat::SPEECH;
        assert_eq!(format.bytes_per_frame(), 2);
        assert_eq!(format.bytes_for(Duration::from_millis(20)), 320);
        assert_eq!(format.duration_of(320), Duration::from_millis(20));
    }

    #[test]
    fn test_software_device_roundtrip() {
        let (mut device, render) = SoftwareDevice::new(64);
        assert_eq!(device.min_buffer_size(&PcmFormat::SPEECH), Ok(64));

        device.open(&PcmFormat::SPEECH, 64).unwrap();
        device.play().unwrap();
        assert_eq!(device.write(&[1, 2, 3]).unwrap(), 3);
        assert_eq!(render.pending(), 3);
        assert_eq!(render.render(2), vec![1, 2]);
        assert_eq!(render.render(5), vec![3]);
        assert_eq!(device.underrun_count(), 1);
    }

    #[test]
    fn test_paused_device_renders_nothing() {
        let (mut device, render) = SoftwareDevice::new(64);
        device.open(&PcmFormat::SPEECH, 64).unwrap();
        device.play().unwrap();
        device.write(&[9; 4]).unwrap();
        device.pause().unwrap();

        assert!(render.render(4).is_empty());
        assert_eq!(device.flush(), 4);
        assert_eq!(device.underrun_count(), 0);
    }

    #[test]
    fn test_unavailable_device() {
        let mut device = SoftwareDevice::unavailable("unplugged");
        assert_eq!(
            device.open(&PcmFormat::SPEECH, 64),
            Err(AudioError::DeviceUnavailable("unplugged".into()))
        );
    }

    #[test]
    fn test_write_before_open_fails() {
        let (mut device, _render) = SoftwareDevice::new(64);
        assert!(device.write(&[1]).is_err());
        assert!(device.play().is_err());
    }

    #[test]
    fn test_realtime_renderer_drains() {
        let (mut device, render) = SoftwareDevice::new(64);
        device.open(&PcmFormat::SPEECH, 320).unwrap();
        device.play().unwrap();

        let observer = render.clone();
        let mut renderer = render.spawn_realtime(8000, 40).unwrap();
        // 480 samples through a 160 sample buffer: only completes if rendered
        device.write(&vec![1; 480]).unwrap();
        renderer.stop();

        assert!(observer.pending() <= 160);
    }

    #[test]
    fn test_disconnect_releases_blocked_write() {
        let (mut device, render) = SoftwareDevice::new(8);
        device.open(&PcmFormat::SPEECH, 8).unwrap();
        device.play().unwrap();
        device.write(&[1; 4]).unwrap();

        let unplug = {
            let render = render.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                render.disconnect("unplugged");
            })
        };
        assert_eq!(
            device.write(&[2; 4]),
            Err(AudioError::DeviceUnavailable("unplugged".into()))
        );
        unplug.join().unwrap();
        assert!(!render.is_playing());
    }
}
