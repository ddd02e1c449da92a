//! Error and warning types for the relay

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The output device could not be opened or started. Fatal to the session.
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// An operation was invoked outside the playback state it requires.
    #[error("Invalid playback state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: crate::audio::PlaybackState,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Device stream error: {0}")]
    StreamError(String),
}

/// Cross-thread relay errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The consumer side has been torn down; nothing more is accepted.
    #[error("Relay closed")]
    Closed,

    #[error("Malformed statistics report: expected at least {expected} values, got {actual}")]
    MalformedStats { expected: usize, actual: usize },

    #[error("Malformed PCM payload: {0} bytes is not a whole number of samples")]
    MalformedPcm(usize),
}

/// Session controller errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session already running")]
    AlreadyRunning,

    #[error("Session is not running")]
    NotRunning,

    #[error("Decoder refused to start")]
    DecoderRefused,

    #[error("Audio failure: {0}")]
    Audio(#[from] AudioError),
}

/// Recoverable conditions reported through the buffer-health signal.
///
/// These are never returned as errors; they are logged and counted.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The relay was drained later than the device buffer could cover,
    /// measured from the end of the previous dispatch.
    BufferUnderrun { stalled_for: Duration },

    /// The audio device itself ran dry and played silence.
    DeviceUnderrun { count: u64 },

    /// A latest-value mailbox was overwritten before it was read.
    RelayOverflow {
        channel: MailboxKind,
        overwritten: u64,
    },
}

/// Which single-slot mailbox a warning refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxKind {
    Diagnostics,
    Sync,
}

impl fmt::Display for MailboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailboxKind::Diagnostics => write!(f, "diagnostics"),
            MailboxKind::Sync => write!(f, "sync"),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::BufferUnderrun { stalled_for } => {
                write!(f, "audio buffer underrun after {:?} without data", stalled_for)
            }
            Warning::DeviceUnderrun { count } => {
                write!(f, "audio device ran dry {} times", count)
            }
            Warning::RelayOverflow {
                channel,
                overwritten,
            } => write!(f, "{} mailbox overwritten {} times", channel, overwritten),
        }
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
