//! Constellation scatter renderer

use serde::{Deserialize, Serialize};

use crate::protocol::Point2D;
use crate::render::primitives::{DrawCommand, Pos, Rgb, Viewport};
use crate::stats::ScatterBuffer;

pub const DEFAULT_SCALE_CONSTANT: f64 = 10000.0;
pub const DEFAULT_POINT_RADIUS: f32 = 2.0;

/// How symbol coordinates are scaled to pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScaleStrategy {
    /// Scale follows the magnitude filter: `extent / level / scale_constant`
    Adaptive { scale_constant: f64 },
    /// Constant pixels per unit; coordinates are folded to their absolute
    /// value, so the constellation occupies one quadrant.
    Fixed { pixels_per_unit: f64 },
}

impl ScaleStrategy {
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            ScaleStrategy::Adaptive { scale_constant } if !(scale_constant > 0.0) => Err(format!(
                "scatter scale_constant must be positive, got {}",
                scale_constant
            )),
            ScaleStrategy::Fixed { pixels_per_unit } if !(pixels_per_unit > 0.0) => Err(format!(
                "scatter pixels_per_unit must be positive, got {}",
                pixels_per_unit
            )),
            _ => Ok(()),
        }
    }

    /// Horizontal and vertical pixels per unit
    pub fn scales(&self, filter_level: f64, viewport: &Viewport) -> (f64, f64) {
        match *self {
            ScaleStrategy::Adaptive { scale_constant } => (
                viewport.width as f64 / filter_level / scale_constant,
                viewport.height as f64 / filter_level / scale_constant,
            ),
            ScaleStrategy::Fixed { pixels_per_unit } => (pixels_per_unit, pixels_per_unit),
        }
    }

    fn fold(&self, p: Point2D) -> Point2D {
        match self {
            ScaleStrategy::Adaptive { .. } => p,
            ScaleStrategy::Fixed { .. } => Point2D::new(p.x.abs(), p.y.abs()),
        }
    }
}

impl Default for ScaleStrategy {
    fn default() -> Self {
        ScaleStrategy::Adaptive {
            scale_constant: DEFAULT_SCALE_CONSTANT,
        }
    }
}

/// Paints the whole viewport and every buffered symbol on each call
#[derive(Debug, Clone)]
pub struct ScatterRenderer {
    pub strategy: ScaleStrategy,
    pub radius: f32,
    pub background: Rgb,
    pub color: Rgb,
}

impl ScatterRenderer {
    pub fn new(strategy: ScaleStrategy) -> Self {
        Self {
            strategy,
            radius: DEFAULT_POINT_RADIUS,
            background: Rgb::WHITE,
            color: Rgb::BLUE,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn render_buffer(&self, buffer: &ScatterBuffer, viewport: Viewport) -> Vec<DrawCommand> {
        self.render(buffer.points(), buffer.filter_level(), viewport)
    }

    pub fn render<'a>(
        &self,
        points: impl IntoIterator<Item = &'a Point2D>,
        filter_level: f64,
        viewport: Viewport,
    ) -> Vec<DrawCommand> {
        let (x_scale, y_scale) = self.strategy.scales(filter_level, &viewport);
        let (cx, cy) = (viewport.width as f64 / 2.0, viewport.height as f64 / 2.0);

        let mut commands = vec![DrawCommand::Fill {
            color: self.background,
        }];
        commands.extend(points.into_iter().filter(|p| p.is_finite()).map(|p| {
            let p = self.strategy.fold(*p);
            DrawCommand::Circle {
                center: Pos::new((p.x * x_scale + cx) as f32, (p.y * y_scale + cy) as f32),
                radius: self.radius,
                color: self.color,
            }
        }));
        commands
    }
}

impl Default for ScatterRenderer {
    fn default() -> Self {
        Self::new(ScaleStrategy::default())
    }
}
