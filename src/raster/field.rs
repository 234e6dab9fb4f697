//=========================================================================
// Aligned Field
//=========================================================================
//
// A text field with a per-length x-offset table.
//
// Entry `n` of the table is added to the anchor when the text is `n + 1`
// characters long; longer text uses the last entry. A score anchored at
// x = 55 with table [0, -7] stays visually in place when it goes from
// "9" to "10".
//
//=========================================================================

use super::{Color, FontId, Painter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedField {
    pub font: FontId,
    pub x: i32,
    pub y: i32,
    offsets: &'static [i32],
}

impl AlignedField {
    pub const fn new(font: FontId, x: i32, y: i32, offsets: &'static [i32]) -> Self {
        Self { font, x, y, offsets }
    }

    /// Field that never shifts.
    pub const fn fixed(font: FontId, x: i32, y: i32) -> Self {
        Self::new(font, x, y, &[])
    }

    /// Same field moved by `(dx, dy)`, e.g. into another widget slot.
    pub fn at(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Anchor x for `text` after applying the offset table.
    pub fn x_for(&self, text: &str) -> i32 {
        let len = text.chars().count();
        if len == 0 {
            return self.x;
        }
        let shift = self
            .offsets
            .get(len - 1)
            .or(self.offsets.last())
            .copied()
            .unwrap_or(0);
        self.x + shift
    }

    pub fn draw(&self, painter: &mut Painter<'_>, color: Color, text: &str) -> i32 {
        painter.text(self.font, self.x_for(text), self.y, color, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORE: AlignedField = AlignedField::new(FontId::Bold32, 55, 22, &[0, -7]);

    #[test]
    fn double_digits_shift_left() {
        assert_eq!(SCORE.x_for("9"), 55);
        assert_eq!(SCORE.x_for("10"), 48);
    }

    #[test]
    fn longer_text_uses_last_entry() {
        assert_eq!(SCORE.x_for("100"), 48);
    }

    #[test]
    fn fixed_field_ignores_length() {
        let field = AlignedField::fixed(FontId::Bold16, 3, 4).at(10, 20);
        assert_eq!(field.x_for("12345"), 13);
        assert_eq!(field.y, 24);
    }
}
