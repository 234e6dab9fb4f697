//=========================================================================
// Painter
//=========================================================================
//
// Geometry primitives over a borrowed canvas.
//
// All coordinates are signed and may fall outside the canvas; clipping is
// left to the canvas, so no primitive ever fails.
//
//=========================================================================

//=== Internal Dependencies ===============================================

use super::{Canvas, Color, FontId};

/// Subtracted from each sampled radius before rounding so samples that
/// land exactly on a half pixel do not all round the same way.
const RADIUS_EPSILON: f64 = 0.01;

/// Angular step of the quarter arc, in degrees.
const ARC_STEP: usize = 10;

//=== Painter =============================================================

pub struct Painter<'a> {
    canvas: &'a mut dyn Canvas,
}

impl<'a> Painter<'a> {
    pub fn new(canvas: &'a mut dyn Canvas) -> Self {
        Self { canvas }
    }

    pub fn width(&self) -> i32 {
        self.canvas.width()
    }

    pub fn height(&self) -> i32 {
        self.canvas.height()
    }

    pub fn background(&self) -> Color {
        self.canvas.background()
    }

    pub fn pixel(&mut self, x: i32, y: i32, color: Color) {
        self.canvas.set_pixel(x, y, color);
    }

    //--- line() -----------------------------------------------------------

    /// Inclusive straight line, integer Bresenham over all octants.
    pub fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        let dx = (x2 - x1).abs();
        let dy = -(y2 - y1).abs();
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };

        let (mut x, mut y) = (x1, y1);
        let mut err = dx + dy;

        loop {
            self.canvas.set_pixel(x, y, color);
            if x == x2 && y == y2 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    //--- clear_section() --------------------------------------------------

    /// Paints the inclusive rectangle with the canvas background.
    pub fn clear_section(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let background = self.canvas.background();
        self.canvas.fill_rect(x1, y1, x2, y2, background);
    }

    //--- circle() ---------------------------------------------------------

    /// Circle of `radius` around `(cx, cy)`.
    ///
    /// One quarter arc is sampled every 10° and each sample is mirrored
    /// into the other three quadrants. Unfilled circles cover the band
    /// `(radius - thickness, radius]`; filled ones every radius down to 1
    /// plus the center pixel.
    pub fn circle(&mut self, cx: i32, cy: i32, radius: i32, thickness: i32, filled: bool, color: Color) {
        let stop = band_stop(radius, thickness, filled);
        if filled && radius >= 0 {
            self.canvas.set_pixel(cx, cy, color);
        }

        for degrees in (0..=90).step_by(ARC_STEP) {
            let (sin, cos) = (degrees as f64).to_radians().sin_cos();

            for r in (stop + 1..=radius).rev() {
                let r_eff = f64::from(r) - RADIUS_EPSILON;
                let dx = (r_eff * cos).round() as i32;
                let dy = (r_eff * sin).round() as i32;

                self.canvas.set_pixel(cx + dx, cy + dy, color);
                self.canvas.set_pixel(cx - dy, cy + dx, color);
                self.canvas.set_pixel(cx - dx, cy - dy, color);
                self.canvas.set_pixel(cx + dy, cy - dx, color);
            }
        }
    }

    //--- diamond() --------------------------------------------------------

    /// Diamond with N/E/S/W vertices `radius` from the center.
    ///
    /// Each layer is four lines N→E→S→W, shrinking inward by one pixel.
    pub fn diamond(&mut self, cx: i32, cy: i32, radius: i32, thickness: i32, filled: bool, color: Color) {
        let stop = band_stop(radius, thickness, filled);
        if filled && radius >= 0 {
            self.canvas.set_pixel(cx, cy, color);
        }

        for r in (stop + 1..=radius).rev() {
            let north = (cx, cy - r);
            let east = (cx + r, cy);
            let south = (cx, cy + r);
            let west = (cx - r, cy);

            self.line(north.0, north.1, east.0, east.1, color);
            self.line(east.0, east.1, south.0, south.1, color);
            self.line(south.0, south.1, west.0, west.1, color);
            self.line(west.0, west.1, north.0, north.1, color);
        }
    }

    //--- arrow() ----------------------------------------------------------

    /// Filled isosceles triangle with its apex at `(cx, cy)`.
    ///
    /// Row `k` of `height` lies at `cy + k` when pointing up and `cy - k`
    /// when pointing down, with half-width `k`.
    pub fn arrow(&mut self, cx: i32, cy: i32, height: i32, pointing_up: bool, color: Color) {
        let sign = if pointing_up { 1 } else { -1 };
        for k in 0..height.max(0) {
            let y = cy + sign * k;
            self.line(cx - k, y, cx + k, y, color);
        }
    }

    //--- text() -----------------------------------------------------------

    pub fn text(&mut self, font: FontId, x: i32, y: i32, color: Color, text: &str) -> i32 {
        self.canvas.draw_text(font, x, y, color, text)
    }
}

/// Innermost radius (exclusive) drawn for a shape band.
fn band_stop(radius: i32, thickness: i32, filled: bool) -> i32 {
    if filled {
        0
    } else {
        (radius - thickness.max(0)).max(0)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
