//! Rolling window of chart points with incrementally maintained bounds
//!
//! Appending widens the bounds in O(1). Evicting a point strictly inside the
//! bounds leaves them untouched; evicting a point that sits on a bound forces
//! an O(N) rescan of that bound over the remaining window. Ties always rescan.

use std::collections::VecDeque;

use crate::protocol::Point2D;

/// Axis-aligned extent of the points in a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Reported while the window is empty
    pub const EMPTY: Bounds = Bounds {
        min_x: 0.0,
        max_x: 10.0,
        min_y: -10.0,
        max_y: 10.0,
    };

    fn at(p: Point2D) -> Self {
        Self {
            min_x: p.x,
            max_x: p.x,
            min_y: p.y,
            max_y: p.y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Whether `p` lies inside or on the bounds
    pub fn contains(&self, p: Point2D) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Bounded FIFO of points with running min/max on both axes
#[derive(Debug, Clone)]
pub struct RollingBoundsBuffer {
    points: VecDeque<Point2D>,
    capacity: usize,
    bounds: Bounds,
    /// Full rescans performed by evictions
    rescans: u64,
}

impl RollingBoundsBuffer {
    /// Create a buffer holding at most `capacity` points (clamped to 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
            bounds: Bounds::EMPTY,
            rescans: 0,
        }
    }

    /// Append a point, evicting the oldest one once the window is over
    /// capacity. Returns the evicted point.
    ///
    /// Non-finite points are ignored.
    pub fn append(&mut self, p: Point2D) -> Option<Point2D> {
        if !p.is_finite() {
            tracing::trace!("Ignoring non-finite chart point {:?}", p);
            return None;
        }

        if self.points.is_empty() {
            self.bounds = Bounds::at(p);
        } else {
            self.widen(p);
        }
        self.points.push_back(p);

        if self.points.len() > self.capacity {
            self.evict_oldest()
        } else {
            None
        }
    }

    /// Remove the oldest point, keeping the bounds exact.
    pub fn evict_oldest(&mut self) -> Option<Point2D> {
        self.remove(0)
    }

    /// Remove the point at `index` (0 is the oldest), keeping the bounds exact.
    pub fn remove(&mut self, index: usize) -> Option<Point2D> {
        let removed = self.points.remove(index)?;

        if self.points.is_empty() {
            self.bounds = Bounds::EMPTY;
            return Some(removed);
        }

        if removed.x <= self.bounds.min_x {
            self.bounds.min_x = self.scan(|p| p.x, f64::min);
            self.rescans += 1;
        }
        if removed.x >= self.bounds.max_x {
            self.bounds.max_x = self.scan(|p| p.x, f64::max);
            self.rescans += 1;
        }
        if removed.y <= self.bounds.min_y {
            self.bounds.min_y = self.scan(|p| p.y, f64::min);
            self.rescans += 1;
        }
        if removed.y >= self.bounds.max_y {
            self.bounds.max_y = self.scan(|p| p.y, f64::max);
            self.rescans += 1;
        }

        Some(removed)
    }

    fn widen(&mut self, p: Point2D) {
        let b = &mut self.bounds;
        b.min_x = b.min_x.min(p.x);
        b.max_x = b.max_x.max(p.x);
        b.min_y = b.min_y.min(p.y);
        b.max_y = b.max_y.max(p.y);
    }

    /// Fold one coordinate over the whole window. Only called when non-empty.
    fn scan(&self, coord: impl Fn(&Point2D) -> f64, pick: fn(f64, f64) -> f64) -> f64 {
        let mut iter = self.points.iter().map(coord);
        let first = iter.next().unwrap_or_default();
        iter.fold(first, pick)
    }

    pub fn current_bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = &Point2D> + '_ {
        self.points.iter()
    }

    /// Contiguous copy of the window, oldest first
    pub fn to_vec(&self) -> Vec<Point2D> {
        self.points.iter().copied().collect()
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

    /// Number of O(N) bound rescans triggered by evictions so far
    pub fn rescans(&self) -> u64 {
        self.rescans
    }

    /// Drop all points and return to the empty bounds
    pub fn clear(&mut self) {
        self.points.clear();
        self.bounds = Bounds::EMPTY;
    }
}
