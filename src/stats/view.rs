//! Per-session chart state fed from decoder statistics

use crate::config::AppConfig;
use crate::protocol::{DiagnosticSample, Point2D};
use crate::stats::rolling::RollingBoundsBuffer;
use crate::stats::scatter::ScatterBuffer;

/// Everything the presentation layer repaints from.
///
/// Owned and mutated by the consumer thread only.
#[derive(Debug, Clone)]
pub struct DiagnosticsView {
    frequency: RollingBoundsBuffer,
    timing: RollingBoundsBuffer,
    scatter: ScatterBuffer,
    /// X coordinate of the next chart point
    next_x: u64,
    latest: Option<DiagnosticSample>,
}

impl DiagnosticsView {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            frequency: RollingBoundsBuffer::new(config.charts.history_size),
            timing: RollingBoundsBuffer::new(config.charts.history_size),
            scatter: ScatterBuffer::new(config.scatter.capacity, config.scatter.filter),
            next_x: 0,
            latest: None,
        }
    }

    /// Add one statistics report to both charts and the scatter plot.
    pub fn record(&mut self, sample: DiagnosticSample) {
        let x = self.next_x as f64;
        self.frequency
            .append(Point2D::new(x, sample.frequency_offset_hz as f64));
        self.timing
            .append(Point2D::new(x, sample.timing_offset_samples as f64));
        self.scatter.push_batch(sample.symbol_points());
        self.next_x += 1;
        self.latest = Some(sample);
    }

    pub fn frequency_offset(&self) -> &RollingBoundsBuffer {
        &self.frequency
    }

    pub fn timing_offset(&self) -> &RollingBoundsBuffer {
        &self.timing
    }

    pub fn scatter(&self) -> &ScatterBuffer {
        &self.scatter
    }

    pub fn latest(&self) -> Option<&DiagnosticSample> {
        self.latest.as_ref()
    }

    /// Reports recorded since the last clear
    pub fn recorded(&self) -> u64 {
        self.next_x
    }

    pub fn clear(&mut self) {
        self.frequency.clear();
        self.timing.clear();
        self.scatter.clear();
        self.next_x = 0;
        self.latest = None;
    }
}
