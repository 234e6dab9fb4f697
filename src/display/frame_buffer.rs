//=========================================================================
// Frame Buffer
//=========================================================================
//
// In-memory double-buffered canvas. Stands in for the matrix driver in the
// emulator backend and in tests.
//
// Drawing goes to the back buffer, `swap()` publishes it to the front.
// The back buffer is kept after a swap so partial redraws build on the
// last complete frame. Glyph rendering belongs to the font collaborator,
// so text is recorded as operations rather than rasterized.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

//=== Internal Dependencies ===============================================

use super::Backend;
use crate::raster::{Canvas, Color, FontId};

//=== TextOp ==============================================================

/// One recorded text draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOp {
    pub font: FontId,
    pub x: i32,
    pub y: i32,
    pub color: Color,
    pub text: String,
}

//=== FrameBuffer =========================================================

pub struct FrameBuffer {
    width: i32,
    height: i32,
    background: Color,
    back: Vec<Color>,
    front: Vec<Color>,
    back_text: Vec<TextOp>,
    front_text: Vec<TextOp>,
    swaps: u64,
    intensity: u8,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32, backend: Backend) -> Self {
        let width = i32::try_from(width).unwrap_or(i32::MAX);
        let height = i32::try_from(height).unwrap_or(i32::MAX);
        let background = backend.background();
        let len = width.max(0) as usize * height.max(0) as usize;

        Self {
            width,
            height,
            background,
            back: vec![background; len],
            front: vec![background; len],
            back_text: Vec::new(),
            front_text: Vec::new(),
            swaps: 0,
            intensity: 100,
        }
    }

    //--- Inspection (front buffer) ----------------------------------------

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.index(x, y).map(|i| self.front[i])
    }

    /// Front-buffer pixels that differ from the background.
    pub fn lit_pixels(&self) -> usize {
        self.front.iter().filter(|&&c| c != self.background).count()
    }

    /// Lit front-buffer pixels inside the inclusive rectangle.
    pub fn lit_in(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> usize {
        (y1..=y2)
            .flat_map(|y| (x1..=x2).map(move |x| (x, y)))
            .filter_map(|(x, y)| self.pixel(x, y))
            .filter(|&c| c != self.background)
            .count()
    }

    pub fn texts(&self) -> &[TextOp] {
        &self.front_text
    }

    pub fn shows_text(&self, needle: &str) -> bool {
        self.front_text.iter().any(|op| op.text.contains(needle))
    }

    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    pub fn brightness(&self) -> u8 {
        self.intensity
    }

    //--- Internal Helpers -------------------------------------------------

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.contains(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }
}

impl Canvas for FrameBuffer {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn background(&self) -> Color {
        self.background
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some(i) = self.index(x, y) {
            self.back[i] = color;
        }
    }

    fn draw_text(&mut self, font: FontId, x: i32, y: i32, color: Color, text: &str) -> i32 {
        self.back_text.push(TextOp {
            font,
            x,
            y,
            color,
            text: text.to_string(),
        });
        font.glyph_width() * text.chars().count() as i32
    }

    fn swap(&mut self) {
        self.front.copy_from_slice(&self.back);
        self.front_text.clone_from(&self.back_text);
        self.swaps += 1;
    }

    fn set_brightness(&mut self, intensity: u8) {
        self.intensity = intensity.min(100);
    }

    /// Also drops text anchored inside the rectangle.
    fn fill_rect(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        let (x1, x2) = (x1.min(x2).max(0), x1.max(x2).min(self.width - 1));
        let (y1, y2) = (y1.min(y2).max(0), y1.max(y2).min(self.height - 1));

        for y in y1..=y2 {
            for x in x1..=x2 {
                self.set_pixel(x, y, color);
            }
        }
        self.back_text
            .retain(|op| !((x1..=x2).contains(&op.x) && (y1..=y2).contains(&op.y)));
    }
}

//=== SharedFrameBuffer ===================================================

/// Frame buffer handle that can be drawn through on the core thread and
/// inspected from another.
#[derive(Clone)]
pub struct SharedFrameBuffer(Arc<Mutex<FrameBuffer>>);

impl SharedFrameBuffer {
    pub fn new(frame: FrameBuffer) -> Self {
        Self(Arc::new(Mutex::new(frame)))
    }

    pub fn lock(&self) -> MutexGuard<'_, FrameBuffer> {
        self.0.lock()
    }
}

impl Canvas for SharedFrameBuffer {
    fn width(&self) -> i32 {
        self.0.lock().width
    }

    fn height(&self) -> i32 {
        self.0.lock().height
    }

    fn background(&self) -> Color {
        self.0.lock().background
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        self.0.lock().set_pixel(x, y, color);
    }

    fn draw_text(&mut self, font: FontId, x: i32, y: i32, color: Color, text: &str) -> i32 {
        self.0.lock().draw_text(font, x, y, color, text)
    }

    fn swap(&mut self) {
        self.0.lock().swap();
    }

    fn set_brightness(&mut self, intensity: u8) {
        self.0.lock().set_brightness(intensity);
    }

    fn fill_rect(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        self.0.lock().fill_rect(x1, y1, x2, y2, color);
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
