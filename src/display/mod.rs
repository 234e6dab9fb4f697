//=========================================================================
// Display
//=========================================================================
//
// Everything between a scheduler decision and pixels on the matrix.
//
// Architecture:
//   Redraw ──> RenderDriver ──> Layout (slot geometry, field placement)
//                   │              │
//                   │              └─> Painter ──> dyn Canvas
//                   └─ swap() once per complete frame or widget
//
// The canvas backend is picked once at startup and is opaque afterwards;
// only the background color differs between backends.
//
//=========================================================================

//=== Module Declarations =================================================

mod driver;
mod frame_buffer;
mod layout;

//=== Public API ==========================================================

pub use driver::RenderDriver;
pub use frame_buffer::{FrameBuffer, SharedFrameBuffer, TextOp};
pub use layout::ScoreboardLayout;

//=== External Dependencies ===============================================

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

//=== Internal Dependencies ===============================================

use crate::core::patch::Tree;
use crate::core::settings::Mode;
use crate::raster::{Color, Painter};

//=== Backend =============================================================

/// Canvas backend selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Hardware,
    /// Desktop emulator; clears to grey so unlit pixels stay visible.
    Emulator,
}

impl Backend {
    pub fn background(self) -> Color {
        match self {
            Backend::Hardware => Color::BLACK,
            Backend::Emulator => Color::GREY,
        }
    }
}

//=== Region ==============================================================

/// Inclusive screen rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Region {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.x1..=self.x2).contains(&x) && (self.y1..=self.y2).contains(&y)
    }

    pub fn clear(&self, painter: &mut Painter<'_>) {
        painter.clear_section(self.x1, self.y1, self.x2, self.y2);
    }
}

//=== Layout ==============================================================

/// Maps entity fields to screen positions for every mode.
///
/// The render driver clears a region before asking the layout to draw
/// into it, so layouts only ever paint.
pub trait Layout: Send {
    /// Region owned by game widget `slot` in `mode`.
    fn slot_region(&self, mode: Mode, slot: usize) -> Region;

    fn draw_game(&self, painter: &mut Painter<'_>, mode: Mode, slot: usize, game: &Tree);

    /// Region of the focus panel in gamecast mode.
    fn focus_region(&self) -> Region;

    fn draw_focus(&self, painter: &mut Painter<'_>, focus: &Tree);

    fn draw_no_games(&self, painter: &mut Painter<'_>);

    /// Marks `page` of `page_count`; only called when there is more than one.
    fn draw_page_indicator(&self, painter: &mut Painter<'_>, page: usize, page_count: usize);

    /// Region of the delayed clock readout.
    fn clock_region(&self) -> Region;

    /// Wall-clock time `delay` seconds ago, which is where the game data is.
    fn draw_clock(&self, painter: &mut Painter<'_>, delayed: NaiveTime, delay: u32);
}
