//! Pure mapping from buffered chart data to draw primitives
//!
//! Nothing here touches a window system; the presentation layer replays the
//! returned [`DrawCommand`]s on whatever canvas it owns.

pub mod chart;
pub mod labels;
pub mod primitives;
pub mod scatter;

pub use chart::{ChartRenderer, SeriesStyle};
pub use labels::{axis_labels, label_precision, vertical_axis_labels, AxisLabel};
pub use primitives::{DrawCommand, Pos, Rgb, Viewport};
pub use scatter::{ScaleStrategy, ScatterRenderer};
