//! Rolling line chart renderer

use crate::protocol::Point2D;
use crate::render::primitives::{DrawCommand, Pos, Rgb, Viewport};
use crate::stats::{Bounds, RollingBoundsBuffer};

/// Horizontal spacing of the fill-under strokes
const FILL_STEP_PX: f32 = 3.0;

/// Appearance of one chart series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStyle {
    pub title: String,
    pub color: Rgb,
    pub thickness: f32,
}

impl SeriesStyle {
    pub fn frequency_offset() -> Self {
        Self {
            title: "Frequency Estimation".into(),
            color: Rgb::new(200, 50, 0),
            thickness: 3.0,
        }
    }

    pub fn timing_offset() -> Self {
        Self {
            title: "Timing Offset".into(),
            color: Rgb::new(50, 200, 0),
            thickness: 3.0,
        }
    }
}

impl Default for SeriesStyle {
    fn default() -> Self {
        Self {
            title: String::new(),
            color: Rgb::SERIES,
            thickness: 3.0,
        }
    }
}

/// Maps a window of points and its bounds to line segments
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    pub style: SeriesStyle,
    pub fill_under: bool,
    pub fill_color: Rgb,
}

impl ChartRenderer {
    pub fn new(style: SeriesStyle) -> Self {
        Self {
            style,
            fill_under: false,
            fill_color: Rgb::FILL,
        }
    }

    pub fn with_fill_under(mut self, fill_under: bool) -> Self {
        self.fill_under = fill_under;
        self
    }

    pub fn render_buffer(&self, buffer: &RollingBoundsBuffer, viewport: Viewport) -> Vec<DrawCommand> {
        self.render(buffer.points(), buffer.current_bounds(), viewport)
    }

    /// One segment per consecutive pair of points, preceded by the fill
    /// strokes when enabled.
    pub fn render<'a>(
        &self,
        points: impl IntoIterator<Item = &'a Point2D>,
        bounds: Bounds,
        viewport: Viewport,
    ) -> Vec<DrawCommand> {
        let projected: Vec<Pos> = points
            .into_iter()
            .map(|p| project(*p, &bounds, &viewport))
            .collect();

        let mut commands = Vec::with_capacity(projected.len());
        if self.fill_under {
            self.fill_strokes(&projected, &viewport, &mut commands);
        }
        for pair in projected.windows(2) {
            commands.push(DrawCommand::Line {
                from: pair[0],
                to: pair[1],
                color: self.style.color,
                thickness: self.style.thickness,
            });
        }
        commands
    }

    fn fill_strokes(&self, projected: &[Pos], viewport: &Viewport, out: &mut Vec<DrawCommand>) {
        let baseline = viewport.plot_height() + viewport.border;
        for pair in projected.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let steps = (((end.x - start.x) / FILL_STEP_PX) as usize + 1).max(2);
            for i in 0..steps {
                let t = i as f32 / (steps - 1) as f32;
                let x = start.x + (end.x - start.x) * t;
                let y = start.y + (end.y - start.y) * t;
                // keep off the left edge
                if x > 1.0 {
                    out.push(DrawCommand::Line {
                        from: Pos::new(x, baseline),
                        to: Pos::new(x, y),
                        color: self.fill_color,
                        thickness: 0.0,
                    });
                }
            }
        }
    }
}

/// Data space to pixel space.
///
/// A zero-width range on an axis uses the raw offset from the minimum
/// instead of a ratio, so degenerate windows still land on the baseline
/// rather than dividing by zero.
fn project(p: Point2D, bounds: &Bounds, viewport: &Viewport) -> Pos {
    let ratio = |value: f64, min: f64, diff: f64| {
        let offset = value - min;
        if diff == 0.0 {
            offset
        } else {
            offset / diff
        }
    };

    let rx = ratio(p.x, bounds.min_x, bounds.width());
    let ry = ratio(p.y, bounds.min_y, bounds.height());

    let plot_height = viewport.plot_height();
    let x = (viewport.plot_width() as f64 * rx) as f32 + 1.0;
    let y = viewport.border + plot_height - (plot_height as f64 * ry) as f32;
    Pos::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(commands: &[DrawCommand]) -> Vec<(Pos, Pos)> {
        commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Line { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_maps_corners() {
        let renderer = ChartRenderer::new(SeriesStyle::default());
        let points = [Point2D::new(0.0, -1.0), Point2D::new(10.0, 1.0)];
        let bounds = Bounds {
            min_x: 0.0,
            max_x: 10.0,
            min_y: -1.0,
            max_y: 1.0,
        };
        let viewport = Viewport::new(101.0, 180.0, 40.0);

        let segments = lines(&renderer.render(&points, bounds, viewport));
        assert_eq!(segments.len(), 1);
        // bottom-left to top-right of the plot area
        assert_eq!(segments[0].0, Pos::new(1.0, 140.0));
        assert_eq!(segments[0].1, Pos::new(101.0, 40.0));
    }

    #[test]
    fn test_segment_per_consecutive_pair() {
        let mut buffer = RollingBoundsBuffer::new(60);
        for i in 0..5 {
            buffer.append(Point2D::new(i as f64, (i % 2) as f64));
        }
        let renderer = ChartRenderer::new(SeriesStyle::frequency_offset());
        let commands = renderer.render_buffer(&buffer, Viewport::new(200.0, 200.0, 40.0));

        assert_eq!(commands.len(), 4);
        let segments = lines(&commands);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        assert!(matches!(
            commands[0],
            DrawCommand::Line { color, thickness, .. }
                if color == Rgb::new(200, 50, 0) && thickness == 3.0
        ));
    }

    #[test]
    fn test_too_few_points_draw_nothing() {
        let renderer = ChartRenderer::new(SeriesStyle::default());
        let viewport = Viewport::new(100.0, 100.0, 10.0);
        assert!(renderer
            .render(std::iter::empty(), Bounds::EMPTY, viewport)
            .is_empty());

        let mut buffer = RollingBoundsBuffer::new(4);
        buffer.append(Point2D::new(3.0, 3.0));
        assert!(renderer.render_buffer(&buffer, viewport).is_empty());
    }

    #[test]
    fn test_flat_series_sits_on_baseline() {
        let renderer = ChartRenderer::new(SeriesStyle::default());
        let points = [Point2D::new(0.0, 5.0), Point2D::new(1.0, 5.0)];
        let bounds = Bounds {
            min_x: 0.0,
            max_x: 1.0,
            min_y: 5.0,
            max_y: 5.0,
        };
        let viewport = Viewport::new(100.0, 100.0, 10.0);
        let segments = lines(&renderer.render(&points, bounds, viewport));
        assert_eq!(segments[0].0.y, 90.0);
        assert_eq!(segments[0].1.y, 90.0);
        assert!(segments[0].1.x.is_finite());
    }

    #[test]
    fn test_fill_under_precedes_line() {
        let renderer = ChartRenderer::new(SeriesStyle::default()).with_fill_under(true);
        let points = [Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)];
        let bounds = Bounds {
            min_x: 0.0,
            max_x: 1.0,
            min_y: 0.0,
            max_y: 1.0,
        };
        let commands = renderer.render(&points, bounds, Viewport::new(31.0, 100.0, 10.0));

        let fill_count = commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Line { color, .. } if *color == Rgb::FILL))
            .count();
        assert!(fill_count >= 10);
        assert!(matches!(
            commands.last(),
            Some(DrawCommand::Line { color, .. }) if *color == Rgb::SERIES
        ));
    }
}
