//! Bitmap text for title bars
//!
//! Glyphs come from the 8x8 `font8x8` tables; every glyph row is drawn twice
//! so a character occupies an 8x16 cell before scaling.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};

/// Advance of one character at scale 1
pub const GLYPH_WIDTH: u32 = 8;

/// Height of one character at scale 1
pub const GLYPH_HEIGHT: u32 = 16;

/// A mutable view over a row-major `0x00RRGGBB` pixel buffer
pub struct Canvas<'a> {
    pixels: &'a mut [u32],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    /// Wrap `pixels`; returns `None` if the buffer is smaller than `width * height`
    pub fn new(pixels: &'a mut [u32], width: u32, height: u32) -> Option<Self> {
        let needed = (width as usize).checked_mul(height as usize)?;
        (pixels.len() >= needed).then_some(Self {
            pixels,
            width,
            height,
        })
    }

    /// Fill a rectangle, clipped to the canvas
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: u32) {
        let x0 = (x.max(0) as i64).min(self.width as i64);
        let y0 = y.max(0) as i64;
        let x1 = (x as i64 + w as i64).min(self.width as i64);
        let y1 = (y as i64 + h as i64).min(self.height as i64);

        for row in y0..y1 {
            let start = (row * self.width as i64 + x0) as usize;
            let end = (row * self.width as i64 + x1.max(x0)) as usize;
            self.pixels[start..end].fill(color);
        }
    }

    /// Draw `text` with its top-left corner at (x, y)
    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, scale: u32, color: u32) {
        let scale = scale.max(1);
        let cell = (GLYPH_WIDTH * scale) as i32;
        let mut pen = x;

        for c in text.chars() {
            if let Some(rows) = glyph(c) {
                self.draw_glyph(pen, y, &rows, scale, color);
            }
            pen = pen.saturating_add(cell);
            if pen >= self.width as i32 {
                break;
            }
        }
    }

    fn draw_glyph(&mut self, x: i32, y: i32, rows: &[u8; 8], scale: u32, color: u32) {
        let dot_h = 2 * scale;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..8u32 {
                // bit 0 is the leftmost column
                if bits & (1 << col) != 0 {
                    self.fill_rect(
                        x + (col * scale) as i32,
                        y + (row as u32 * dot_h) as i32,
                        scale,
                        dot_h,
                        color,
                    );
                }
            }
        }
    }
}

fn glyph(c: char) -> Option<[u8; 8]> {
    if c == ' ' {
        return None;
    }
    BASIC_FONTS.get(c).or_else(|| LATIN_FONTS.get(c))
}

/// Rendered width of `text` in pixels
pub fn text_width(text: &str, scale: u32) -> u32 {
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    chars.saturating_mul(GLYPH_WIDTH * scale.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_rejects_short_buffer() {
        let mut buf = vec![0u32; 10];
        assert!(Canvas::new(&mut buf, 4, 4).is_none());
        assert!(Canvas::new(&mut buf, 5, 2).is_some());
    }

    #[test]
    fn test_fill_rect_clips_to_canvas() {
        let mut buf = vec![0u32; 16];
        let mut canvas = Canvas::new(&mut buf, 4, 4).unwrap();
        canvas.fill_rect(-2, -2, 4, 4, 7);
        canvas.fill_rect(3, 3, 10, 10, 9);
        assert_eq!(buf[0], 7);
        assert_eq!(buf[1], 7);
        assert_eq!(buf[4], 7);
        assert_eq!(buf[2], 0);
        assert_eq!(buf[15], 9);
        assert_eq!(buf.iter().filter(|&&p| p != 0).count(), 5);
    }

    #[test]
    fn test_text_width_scales() {
        assert_eq!(text_width("", 1), 0);
        assert_eq!(text_width("abc", 1), 24);
        assert_eq!(text_width("abc", 2), 48);
        assert_eq!(text_width("é", 1), 8);
    }

    #[test]
    fn test_draw_text_sets_pixels_inside_cell() {
        let mut buf = vec![0u32; 8 * 16];
        let mut canvas = Canvas::new(&mut buf, 8, 16).unwrap();
        canvas.draw_text(0, 0, "A", 1, 0xff);
        assert!(buf.iter().any(|&p| p == 0xff));

        let mut blank = vec![0u32; 8 * 16];
        let mut canvas = Canvas::new(&mut blank, 8, 16).unwrap();
        canvas.draw_text(0, 0, " ", 1, 0xff);
        assert!(blank.iter().all(|&p| p == 0));
    }
}
