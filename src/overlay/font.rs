// SPDX-License-Identifier: GPL-3.0-only

//! Bitmap text rasterizer for the watermark overlay
//!
//! Glyphs come from the embedded 8x8 font and are scaled up by an integer
//! factor. Fixed glyph cells make text measurement exact, which the word
//! wrap relies on.

use font8x8::legacy::BASIC_LEGACY;
use image::{Rgb, RgbImage};

/// Native glyph cell size of the embedded font
pub const GLYPH_SIZE: u32 = 8;

/// Scaled bitmap-font painter
#[derive(Debug, Clone, Copy)]
pub struct TextPainter {
    scale: u32,
}

impl TextPainter {
    pub fn new(scale: u32) -> Self {
        Self { scale: scale.max(1) }
    }

    /// Pixel width of `text` when drawn by this painter
    pub fn text_width(&self, text: &str) -> u32 {
        text.chars().count() as u32 * GLYPH_SIZE * self.scale
    }

    /// Pixel height of one line of text
    pub fn line_height(&self) -> u32 {
        GLYPH_SIZE * self.scale
    }

    /// Draw `text` with its top-left corner at (x, y)
    ///
    /// Pixels falling outside the image are clipped. Characters outside the
    /// basic ASCII range render as '?'.
    pub fn draw_text(&self, image: &mut RgbImage, text: &str, x: i64, y: i64, color: Rgb<u8>) {
        let mut pen_x = x;
        for ch in text.chars() {
            self.draw_glyph(image, ch, pen_x, y, color);
            pen_x += (GLYPH_SIZE * self.scale) as i64;
        }
    }

    /// Draw `text` with a drop shadow offset down-right by `shadow_offset`
    pub fn draw_text_with_shadow(
        &self,
        image: &mut RgbImage,
        text: &str,
        x: i64,
        y: i64,
        color: Rgb<u8>,
        shadow: Rgb<u8>,
        shadow_offset: u32,
    ) {
        let offset = shadow_offset as i64;
        self.draw_text(image, text, x + offset, y + offset, shadow);
        self.draw_text(image, text, x, y, color);
    }

    fn draw_glyph(&self, image: &mut RgbImage, ch: char, x: i64, y: i64, color: Rgb<u8>) {
        let index = ch as usize;
        let glyph = if index < BASIC_LEGACY.len() {
            BASIC_LEGACY[index]
        } else {
            BASIC_LEGACY[b'?' as usize]
        };

        let (width, height) = image.dimensions();
        let scale = self.scale as i64;

        for (row_index, row) in glyph.iter().enumerate() {
            for bit in 0..8 {
                if row & (1 << bit) == 0 {
                    continue;
                }
                // LSB is the leftmost pixel of the row
                let base_x = x + bit as i64 * scale;
                let base_y = y + row_index as i64 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = base_x + dx;
                        let py = base_y + dy;
                        if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                            image.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}
