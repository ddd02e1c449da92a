//! Draw primitives

/// 8-bit RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    /// Default line colour
    pub const SERIES: Rgb = Rgb::new(0x00, 0x77, 0xcc);
    /// Shading under a line chart
    pub const FILL: Rgb = Rgb::new(20, 40, 60);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Pixel position, origin top-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pos {
    pub x: f32,
    pub y: f32,
}

impl Pos {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Area a chart is drawn into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    /// Blank margin above and below the plot area
    pub border: f32,
}

impl Viewport {
    pub const fn new(width: f32, height: f32, border: f32) -> Self {
        Self {
            width,
            height,
            border,
        }
    }

    pub fn plot_height(&self) -> f32 {
        (self.height - 2.0 * self.border).max(0.0)
    }

    pub fn plot_width(&self) -> f32 {
        (self.width - 1.0).max(0.0)
    }
}

/// One drawing operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    /// Paint the whole viewport
    Fill { color: Rgb },
    Line {
        from: Pos,
        to: Pos,
        color: Rgb,
        thickness: f32,
    },
    /// Filled circle
    Circle { center: Pos, radius: f32, color: Rgb },
}
