//! Symbol scatter buffer and its autoscale estimator

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::protocol::Point2D;

/// Smoothing parameters for [`AdaptiveMagnitudeFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Weight kept from the previous level each update
    pub beta: f64,
    /// Headroom multiplier applied to the observed peak magnitude
    pub gain: f64,
    /// Lowest level the filter may settle at
    pub floor: f64,
    /// Level before the first update
    pub initial_level: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            beta: 0.95,
            gain: 2.5,
            floor: 0.001,
            initial_level: 0.1,
        }
    }
}

/// Single-pole IIR smoother over the peak magnitude of a point set.
///
/// `level = max(floor, beta * level + (1 - beta) * gain * peak)`
#[derive(Debug, Clone)]
pub struct AdaptiveMagnitudeFilter {
    params: FilterParams,
    level: f64,
}

impl AdaptiveMagnitudeFilter {
    pub fn new(params: FilterParams) -> Self {
        Self {
            level: params.initial_level.max(params.floor),
            params,
        }
    }

    /// Fold one batch worth of points into the level and return it.
    pub fn update<'a>(&mut self, points: impl IntoIterator<Item = &'a Point2D>) -> f64 {
        let peak = points
            .into_iter()
            .map(Point2D::magnitude)
            .filter(|m| m.is_finite())
            .fold(0.0, f64::max);
        self.update_with_peak(peak)
    }

    pub fn update_with_peak(&mut self, peak: f64) -> f64 {
        let FilterParams {
            beta, gain, floor, ..
        } = self.params;
        let next = beta * self.level + (1.0 - beta) * gain * peak;
        // NaN from a bad peak falls through to the floor
        self.level = if next.is_finite() { next.max(floor) } else { floor };
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn reset(&mut self) {
        self.level = self.params.initial_level.max(self.params.floor);
    }
}

impl Default for AdaptiveMagnitudeFilter {
    fn default() -> Self {
        Self::new(FilterParams::default())
    }
}

/// Most recent symbols for the scatter plot, plus their smoothed scale
#[derive(Debug, Clone)]
pub struct ScatterBuffer {
    points: VecDeque<Point2D>,
    capacity: usize,
    filter: AdaptiveMagnitudeFilter,
}

impl ScatterBuffer {
    pub fn new(capacity: usize, params: FilterParams) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
            filter: AdaptiveMagnitudeFilter::new(params),
        }
    }

    /// Append one batch of symbols, age out the oldest beyond capacity,
    /// then re-evaluate the filter once over everything buffered.
    pub fn push_batch(&mut self, batch: impl IntoIterator<Item = Point2D>) -> f64 {
        for p in batch {
            self.points.push_back(p);
        }
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
        self.filter.update(self.points.iter())
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = &Point2D> + '_ {
        self.points.iter()
    }

    pub fn filter_level(&self) -> f64 {
        self.filter.level()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.filter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_large_point() {
        let mut filter = AdaptiveMagnitudeFilter::default();
        assert_eq!(filter.level(), 0.1);

        let level = filter.update(&[Point2D::new(1000.0, 0.0)]);
        let expected = (0.95f64 * 0.1 + 0.05 * 2.5 * 1000.0).max(0.001);
        assert!((level - expected).abs() < 1e-9);
        assert!((level - 125.095).abs() < 1e-9);
    }

    #[test]
    fn test_zero_input_decays_to_floor() {
        let mut filter = AdaptiveMagnitudeFilter::default();
        for _ in 0..500 {
            filter.update(&[Point2D::new(0.0, 0.0)]);
        }
        assert_eq!(filter.level(), 0.001);
    }

    #[test]
    fn test_empty_batch_decays() {
        let mut filter = AdaptiveMagnitudeFilter::default();
        let level = filter.update(std::iter::empty());
        assert!((level - 0.095).abs() < 1e-12);
    }

    #[test]
    fn test_negative_coordinates_count_by_magnitude() {
        let mut a = AdaptiveMagnitudeFilter::default();
        let mut b = AdaptiveMagnitudeFilter::default();
        a.update(&[Point2D::new(0.0, -40.0)]);
        b.update(&[Point2D::new(40.0, 0.0)]);
        assert_eq!(a.level(), b.level());
    }

    #[test]
    fn test_scatter_capacity() {
        let mut scatter = ScatterBuffer::new(60, FilterParams::default());
        for batch in 0..5 {
            scatter.push_batch((0..15).map(|i| Point2D::new(batch as f64, i as f64)));
        }
        assert_eq!(scatter.len(), 60);
        assert_eq!(scatter.points().next(), Some(&Point2D::new(1.0, 0.0)));
    }

    #[test]
    fn test_filter_evaluated_per_batch() {
        let mut scatter = ScatterBuffer::new(60, FilterParams::default());
        scatter.push_batch(vec![Point2D::new(1000.0, 0.0), Point2D::new(1.0, 1.0)]);
        // one update for the batch, not one per point
        assert!((scatter.filter_level() - 125.095).abs() < 1e-9);
    }

    #[test]
    fn test_scatter_clear_resets_filter() {
        let mut scatter = ScatterBuffer::new(4, FilterParams::default());
        scatter.push_batch(vec![Point2D::new(500.0, 0.0)]);
        scatter.clear();
        assert!(scatter.is_empty());
        assert_eq!(scatter.filter_level(), 0.1);
    }

    proptest! {
        #[test]
        fn prop_level_never_below_floor(
            batches in proptest::collection::vec(
                proptest::collection::vec((-1e6f64..1e6, -1e6f64..1e6), 0..20),
                1..50,
            ),
        ) {
            let mut scatter = ScatterBuffer::new(60, FilterParams::default());
            for batch in batches {
                let level = scatter.push_batch(batch.into_iter().map(Point2D::from));
                prop_assert!(level >= 0.001);
            }
        }
    }
}
