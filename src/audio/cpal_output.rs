//! Output through the platform audio host (cpal)

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use std::sync::Arc;

use crate::audio::buffer::{PcmRingBuffer, SharedPcmBuffer};
use crate::audio::device::{AudioDevice, PcmFormat};
use crate::error::AudioError;

/// Fallback when the host does not report a buffer range
const FALLBACK_BUFFER_MS: usize = 20;

/// cpal-backed output device
pub struct CpalDevice {
    device: cpal::Device,
    pub name: String,
    stream: Option<cpal::Stream>,
    buffer: Option<SharedPcmBuffer>,
}

impl CpalDevice {
    /// The default host's default output device
    pub fn default_output() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("No default output device".into()))?;
        Ok(Self::from_cpal(device))
    }

    /// An output device by its host name
    pub fn by_name(name: &str) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        for device in devices {
            if device.name().map(|n| n == name).unwrap_or(false) {
                return Ok(Self::from_cpal(device));
            }
        }
        Err(AudioError::DeviceUnavailable(name.to_string()))
    }

    fn from_cpal(device: cpal::Device) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Self {
            device,
            name,
            stream: None,
            buffer: None,
        }
    }

    fn stream(&self) -> Result<&cpal::Stream, AudioError> {
        self.stream
            .as_ref()
            .ok_or_else(|| AudioError::StreamError("device is not open".into()))
    }
}

impl AudioDevice for CpalDevice {
    fn min_buffer_size(&self, format: &PcmFormat) -> Result<usize, AudioError> {
        let fallback = format.sample_rate as usize * FALLBACK_BUFFER_MS / 1000
            * format.bytes_per_frame();

        let config = self
            .device
            .default_output_config()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        Ok(match config.buffer_size() {
            cpal::SupportedBufferSize::Range { min, .. } => {
                (*min as usize * format.bytes_per_frame()).max(fallback)
            }
            cpal::SupportedBufferSize::Unknown => fallback,
        })
    }

    fn open(&mut self, format: &PcmFormat, buffer_bytes: usize) -> Result<(), AudioError> {
        let config = StreamConfig {
            channels: format.channel_layout.channels(),
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::new(PcmRingBuffer::new(buffer_bytes / format.bytes_per_frame()));
        let callback_buffer = buffer.clone();
        let error_buffer = buffer.clone();

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    callback_buffer.read_into(data);
                },
                move |err| {
                    tracing::error!("Output stream error: {}", err);
                    // the data callback will not run again; release the writer
                    if let cpal::StreamError::DeviceNotAvailable = err {
                        error_buffer.fail(err.to_string());
                    }
                },
                None,
            )
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        tracing::info!("Opened output device '{}'", self.name);
        self.stream = Some(stream);
        self.buffer = Some(buffer);
        Ok(())
    }

    fn play(&mut self) -> Result<(), AudioError> {
        self.stream()?
            .play()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        self.stream()?
            .pause()
            .map_err(|e| AudioError::StreamError(e.to_string()))
    }

    fn flush(&mut self) -> usize {
        self.buffer.as_ref().map_or(0, |buffer| buffer.clear())
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize, AudioError> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| AudioError::StreamError("device is not open".into()))?;
        buffer.write_to_device(samples)
    }

    fn close(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            buffer.close();
        }
        // Dropping the stream stops it and releases the device
        self.stream = None;
    }

    fn underrun_count(&self) -> u64 {
        self.buffer.as_ref().map_or(0, |buffer| buffer.underrun_count())
    }
}
