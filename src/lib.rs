//! # FreeDV Relay
//!
//! Real-time relay between a streaming digital-voice decoder and the
//! presentation layer that plays its audio and charts its modem statistics.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                         DECODER THREAD (external)                        │
//! │   ┌───────────────┐      ┌──────────────────┐      ┌────────────────┐    │
//! │   │ decoded audio │      │ demod statistics │      │   sync state   │    │
//! │   └───────┬───────┘      └────────┬─────────┘      └───────┬────────┘    │
//! │           │ publish_audio         │ publish_diagnostics    │ publish_sync│
//! └───────────┼───────────────────────┼────────────────────────┼─────────────┘
//!             ▼                       ▼                        ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                     CROSS-THREAD RELAY (relay::channel)                  │
//! │   ┌───────────────────┐  ┌───────────────────┐  ┌───────────────────┐    │
//! │   │ bounded FIFO      │  │ single-slot       │  │ single-slot       │    │
//! │   │ (audio, lossless) │  │ mailbox (latest)  │  │ mailbox (latest)  │    │
//! │   └─────────┬─────────┘  └─────────┬─────────┘  └─────────┬─────────┘    │
//! └─────────────┼──────────────────────┼──────────────────────┼──────────────┘
//!               │            drain() once per tick            │
//!               ▼                      ▼                      ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                    CONSUMER THREAD (session::Session)                    │
//! │   ┌───────────────────┐  ┌──────────────────────────────────────────┐    │
//! │   │ AudioSink         │  │ DiagnosticsView                          │    │
//! │   │ Stopped/Playing/  │  │  RollingBoundsBuffer (freq offset)       │    │
//! │   │ Paused            │  │  RollingBoundsBuffer (timing offset)     │    │
//! │   └─────────┬─────────┘  │  ScatterBuffer + AdaptiveMagnitudeFilter │    │
//! │             │            └─────────────────────┬────────────────────┘    │
//! │             ▼                                  ▼                         │
//! │   ┌───────────────────┐  ┌──────────────────────────────────────────┐    │
//! │   │ AudioDevice       │  │ ChartRenderer / ScatterRenderer          │    │
//! │   │ (blocking write)  │  │ → DrawCommand list per repaint           │    │
//! │   └───────────────────┘  └──────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod render;
pub mod session;
pub mod stats;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Sample rate of decoded speech audio
    pub const SAMPLE_RATE_HZ: u32 = 8000;

    /// Decoded audio is mono
    pub const CHANNELS: u16 = 1;

    /// Bytes per 16-bit PCM sample
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Number of complex demodulator symbols per statistics report
    pub const SYMBOL_COUNT: usize = 15;

    /// Leading scalar fields of a statistics report (frequency, timing)
    pub const STATS_HEADER_LEN: usize = 2;

    /// Minimum length of a flat statistics report
    pub const STATS_LEN: usize = STATS_HEADER_LEN + 2 * SYMBOL_COUNT;

    /// Points kept on each rolling chart
    pub const HISTORY_SIZE: usize = 60;

    /// Points kept on the symbol scatter plot
    pub const SCATTER_POINTS: usize = 60;

    /// Audio frames the relay queues before the producer blocks
    pub const AUDIO_QUEUE_CAPACITY: usize = 256;

    /// Pixel border above and below a line chart
    pub const CHART_BORDER_PX: f32 = 40.0;
}
