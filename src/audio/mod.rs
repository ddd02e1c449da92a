//! Audio subsystem module

pub mod buffer;
#[cfg(feature = "cpal")]
pub mod cpal_output;
pub mod device;
pub mod sink;

pub use buffer::{PcmRingBuffer, SharedPcmBuffer};
#[cfg(feature = "cpal")]
pub use cpal_output::CpalDevice;
pub use device::{AudioDevice, PcmFormat, RealtimeRenderer, RenderHandle, SoftwareDevice};
pub use sink::{AudioSink, PlaybackState};
