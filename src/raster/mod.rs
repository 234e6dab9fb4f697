//=========================================================================
// Rasterizer
//=========================================================================
//
// Small geometry library that turns layout intent into pixel writes.
//
// Architecture:
//   Layout code ──> Painter ──> dyn Canvas
//                     │           ├─ set_pixel()   clipped, never fails
//                     │           ├─ fill_rect()   region clear
//                     │           └─ draw_text()   glyphs are the canvas's job
//                     └─ line / clear_section / circle / diamond / arrow / text
//
// AlignedField is the per-field x-offset table that keeps numeric fields
// from jumping when they change width.
//
//=========================================================================

//=== Module Declarations =================================================

mod field;
mod painter;

//=== Public API ==========================================================

pub use field::AlignedField;
pub use painter::Painter;

//=== External Dependencies ===============================================

use serde::{Deserialize, Serialize};

//=== Color ===============================================================

/// 24-bit RGB color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);
    pub const LIGHT_BLUE: Color = Color::rgb(0, 255, 255);

    // Need at least 2 PWM bits to show.
    pub const ORANGE: Color = Color::rgb(255, 170, 0);
    pub const MIDDLE_BLUE: Color = Color::rgb(0, 85, 255);

    /// Emulator background. Invisible on hardware at low PWM depth.
    pub const GREY: Color = Color::rgb(20, 20, 20);
}

//=== FontId ==============================================================

/// Bitmap fonts the canvas collaborator is expected to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontId {
    Small6x10,
    Bold12,
    Bold16,
    Bold18,
    Bold28,
    Bold32,
    Symbols,
}

impl FontId {
    /// Fixed advance per glyph in pixels.
    pub fn glyph_width(self) -> i32 {
        match self {
            FontId::Small6x10 => 6,
            FontId::Bold12 => 6,
            FontId::Bold16 => 8,
            FontId::Bold18 => 10,
            FontId::Bold28 => 14,
            FontId::Bold32 => 16,
            FontId::Symbols => 7,
        }
    }
}

//=== Canvas ==============================================================

/// Pixel surface owned by a single render driver.
///
/// Writes outside `0..width` × `0..height` are dropped silently.
pub trait Canvas: Send {
    fn width(&self) -> i32;

    fn height(&self) -> i32;

    /// Color a cleared region is painted with.
    fn background(&self) -> Color;

    fn set_pixel(&mut self, x: i32, y: i32, color: Color);

    /// Draws `text` with its baseline at `y` and returns the advance.
    fn draw_text(&mut self, font: FontId, x: i32, y: i32, color: Color, text: &str) -> i32;

    /// Presents the back buffer. Called once per complete frame or widget.
    fn swap(&mut self);

    /// Sets the driver intensity in percent.
    fn set_brightness(&mut self, intensity: u8);

    /// Fills the inclusive rectangle row by row.
    fn fill_rect(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        for y in y1..=y2 {
            for x in x1..=x2 {
                self.set_pixel(x, y, color);
            }
        }
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        (0..self.width()).contains(&x) && (0..self.height()).contains(&y)
    }
}
