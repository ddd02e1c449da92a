//! Units of decoder output carried across the relay

use bytes::Bytes;

use crate::constants::{BYTES_PER_SAMPLE, STATS_HEADER_LEN, STATS_LEN, SYMBOL_COUNT};
use crate::error::RelayError;

/// One chunk of decoded speech: mono 16-bit signed PCM, little-endian.
///
/// The payload is immutable; moving a frame through the relay transfers the
/// only handle the consumer ever sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pcm: Bytes,
}

impl AudioFrame {
    /// Wrap raw PCM bytes as produced by the decoder.
    pub fn from_le_bytes(pcm: impl Into<Bytes>) -> Result<Self, RelayError> {
        let pcm = pcm.into();
        if pcm.len() % BYTES_PER_SAMPLE != 0 {
            return Err(RelayError::MalformedPcm(pcm.len()));
        }
        Ok(Self { pcm })
    }

    pub fn from_samples(samples: &[i16]) -> Self {
        let mut pcm = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
        for sample in samples {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        Self { pcm: Bytes::from(pcm) }
    }

    /// Number of samples in the frame
    pub fn len(&self) -> usize {
        self.pcm.len() / BYTES_PER_SAMPLE
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pcm
    }

    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.pcm
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Decode into a sample buffer, reusing its allocation.
    pub fn copy_samples_into(&self, out: &mut Vec<i16>) {
        out.clear();
        out.extend(self.samples());
    }

    /// Playback duration in microseconds
    pub fn duration_us(&self, sample_rate: u32) -> u64 {
        (self.len() as u64 * 1_000_000) / sample_rate as u64
    }
}

/// A complex demodulator symbol
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Symbol {
    pub re: f32,
    pub im: f32,
}

/// One snapshot of modem statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticSample {
    pub frequency_offset_hz: f32,
    pub timing_offset_samples: f32,
    pub symbols: [Symbol; SYMBOL_COUNT],
}

impl DiagnosticSample {
    pub fn new(
        frequency_offset_hz: f32,
        timing_offset_samples: f32,
        symbols: [Symbol; SYMBOL_COUNT],
    ) -> Self {
        Self {
            frequency_offset_hz,
            timing_offset_samples,
            symbols,
        }
    }

    /// Parse the decoder's flat report:
    /// `[freq_offset, timing_offset, re0, im0, re1, im1, ...]`.
    ///
    /// Values past the last symbol are ignored.
    pub fn from_stats(stats: &[f32]) -> Result<Self, RelayError> {
        if stats.len() < STATS_LEN {
            return Err(RelayError::MalformedStats {
                expected: STATS_LEN,
                actual: stats.len(),
            });
        }

        let mut symbols = [Symbol::default(); SYMBOL_COUNT];
        for (symbol, pair) in symbols
            .iter_mut()
            .zip(stats[STATS_HEADER_LEN..STATS_LEN].chunks_exact(2))
        {
            *symbol = Symbol {
                re: pair[0],
                im: pair[1],
            };
        }

        Ok(Self::new(stats[0], stats[1], symbols))
    }

    /// Symbols as scatter plot points
    pub fn symbol_points(&self) -> impl Iterator<Item = Point2D> + '_ {
        self.symbols
            .iter()
            .map(|s| Point2D::new(s.re as f64, s.im as f64))
    }
}

/// A point in data space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Largest absolute coordinate
    pub fn magnitude(&self) -> f64 {
        self.x.abs().max(self.y.abs())
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Everything the decoder can hand to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEnvelope {
    Audio(AudioFrame),
    Diagnostics(DiagnosticSample),
    Sync(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_stats() -> Vec<f32> {
        let mut stats = vec![12.5, -3.0];
        for i in 0..SYMBOL_COUNT {
            stats.push(i as f32);
            stats.push(-(i as f32));
        }
        stats
    }

    #[test]
    fn test_audio_frame_from_samples() {
        let frame = AudioFrame::from_samples(&[1, -1, i16::MAX, i16::MIN]);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.as_bytes()[..4], [1, 0, 0xff, 0xff]);
        assert_eq!(
            frame.samples().collect::<Vec<_>>(),
            vec![1, -1, i16::MAX, i16::MIN]
        );
    }

    #[test]
    fn test_audio_frame_rejects_odd_length() {
        let err = AudioFrame::from_le_bytes(vec![0u8; 3]).unwrap_err();
        assert_eq!(err, RelayError::MalformedPcm(3));
    }

    #[test]
    fn test_audio_frame_duration() {
        let frame = AudioFrame::from_samples(&[0; 160]);
        assert_eq!(frame.duration_us(8000), 20_000);
    }

    #[test]
    fn test_stats_parsing() {
        let sample = DiagnosticSample::from_stats(&flat_stats()).unwrap();
        assert_eq!(sample.frequency_offset_hz, 12.5);
        assert_eq!(sample.timing_offset_samples, -3.0);
        assert_eq!(sample.symbols[0], Symbol { re: 0.0, im: -0.0 });
        assert_eq!(sample.symbols[14], Symbol { re: 14.0, im: -14.0 });
        assert_eq!(sample.symbol_points().count(), SYMBOL_COUNT);
    }

    #[test]
    fn test_stats_trailing_values_ignored() {
        let mut stats = flat_stats();
        stats.extend_from_slice(&[99.0; 8]);
        let sample = DiagnosticSample::from_stats(&stats).unwrap();
        assert_eq!(sample.symbols[14].re, 14.0);
    }

    #[test]
    fn test_stats_too_short() {
        let err = DiagnosticSample::from_stats(&[1.0; 31]).unwrap_err();
        assert_eq!(
            err,
            RelayError::MalformedStats {
                expected: 32,
                actual: 31
            }
        );
    }

    #[test]
    fn test_point_magnitude() {
        assert_eq!(Point2D::new(-4.0, 3.0).magnitude(), 4.0);
        assert!(!Point2D::new(f64::NAN, 0.0).is_finite());
    }
}
