//! Rolling statistics kept for the diagnostic charts

pub mod rolling;
pub mod scatter;
pub mod view;

pub use rolling::{Bounds, RollingBoundsBuffer};
pub use scatter::{AdaptiveMagnitudeFilter, FilterParams, ScatterBuffer};
pub use view::DiagnosticsView;
