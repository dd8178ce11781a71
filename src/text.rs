//! Monospace bitmap text.
//!
//! A [`Font`] is a table of glyphs for a contiguous range of character codes. Each glyph is
//! `height` rows of `bytes_per_row()` bytes; a row is read as a little-endian integer and
//! its most significant used bit is the leftmost pixel. Glyphs are at most 32 pixels wide.

use embedded_hal::delay::DelayNs;

use crate::bus::SpiRegisters;
use crate::display::Display;
use crate::transfer::Burst;

/// Widest glyph row supported, in bytes.
pub const MAX_BYTES_PER_ROW: usize = 4;

/// A monospace bitmap font.
#[derive(Debug, Clone, Copy)]
pub struct Font {
    pub width: u8,
    pub height: u8,
    /// First character code in `data`.
    pub first_code: u8,
    /// Last character code in `data`.
    pub last_code: u8,
    pub data: &'static [u8],
}

impl Font {
    pub const fn bytes_per_row(&self) -> usize {
        ((self.width as usize).saturating_sub(1) >> 3) + 1
    }

    /// Bitmap rows of `ch`. Characters outside the font map to the first glyph.
    fn glyph(&self, ch: char) -> Option<&'static [u8]> {
        let code = ch as u32;
        let index = if code < self.first_code as u32 || code > self.last_code as u32 {
            0
        } else {
            (code - self.first_code as u32) as usize
        };
        let size = self.bytes_per_row() * self.height as usize;
        self.data.get(index * size..(index + 1) * size)
    }
}

/// Row bits of a glyph, leftmost pixel first.
struct GlyphRows<'a> {
    rows: core::slice::ChunksExact<'a, u8>,
    width: usize,
    top_bit: u32,
}

impl<'a> GlyphRows<'a> {
    fn new(glyph: &'a [u8], font: &Font) -> Self {
        let bytes = font.bytes_per_row();
        GlyphRows {
            rows: glyph.chunks_exact(bytes),
            width: font.width as usize,
            top_bit: (bytes * 8 - 1) as u32,
        }
    }
}

impl Iterator for GlyphRows<'_> {
    type Item = (u32, usize, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        let bits = row
            .iter()
            .rev()
            .fold(0u32, |acc, &byte| (acc << 8) | byte as u32);
        Some((bits, self.width, self.top_bit))
    }
}

fn pixel_set(bits: u32, top_bit: u32, column: usize) -> bool {
    bits & (1 << (top_bit - column as u32)) != 0
}

/// How glyphs are put on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlyphMode {
    /// Streams the whole glyph cell, painting clear bits with the background color.
    #[default]
    Fast,
    /// Plots set bits only and leaves the background untouched, for text over images.
    Overlay,
}

impl<B, D> Display<B, D>
where
    B: SpiRegisters + 'static,
    D: DelayNs,
{
    /// Draws one character with its top-left corner at `(x, y)`.
    ///
    /// In [`GlyphMode::Fast`] a cell that does not fit on the display is plotted pixel by
    /// pixel and clipped.
    #[allow(clippy::too_many_arguments)]
    pub fn write_char(
        &mut self,
        x: u16,
        y: u16,
        ch: char,
        font: &Font,
        color: u32,
        background: u32,
        mode: GlyphMode,
    ) {
        if font.width == 0 || font.bytes_per_row() > MAX_BYTES_PER_ROW {
            return;
        }
        let Some(glyph) = font.glyph(ch) else {
            return;
        };
        let fg = self.color_24b(color);
        let bg = self.color_24b(background);
        let (w, h) = (font.width as u16, font.height as u16);

        let fits = x as u32 + w as u32 <= self.width() as u32
            && y as u32 + h as u32 <= self.height() as u32;
        if mode == GlyphMode::Fast && fits && h > 0 {
            self.set_active_window(x, y, x + w - 1, y + h - 1);
            self.link.select();
            self.link.data_mode();
            let mut burst = Burst::new(self.link.spi);
            for (bits, width, top_bit) in GlyphRows::new(glyph, font) {
                for column in 0..width {
                    burst.push(if pixel_set(bits, top_bit, column) { fg } else { bg });
                }
            }
            burst.finish();
            self.release_cs();
            return;
        }

        for (row, (bits, width, top_bit)) in GlyphRows::new(glyph, font).enumerate() {
            for column in 0..width {
                let (px, py) = (i64::from(x) + column as i64, i64::from(y) + row as i64);
                if pixel_set(bits, top_bit, column) {
                    self.pixel16(px, py, fg);
                } else if mode == GlyphMode::Fast {
                    self.pixel16(px, py, bg);
                }
            }
        }
    }

    /// Draws `text` starting at `(x, y)`, wrapping to the next line when a glyph would cross
    /// the right edge and stopping once a new line would cross the bottom edge.
    ///
    /// The position after the last glyph is stored as the [`cursor`](Self::cursor).
    #[allow(clippy::too_many_arguments)]
    pub fn write_string(
        &mut self,
        x: u16,
        y: u16,
        text: &str,
        font: &Font,
        color: u32,
        background: u32,
        mode: GlyphMode,
    ) {
        let (fw, fh) = (font.width as u32, font.height as u32);
        let (width, height) = (self.width() as u32, self.height() as u32);
        let (mut x, mut y) = (x as u32, y as u32);

        for ch in text.chars() {
            if x + fw > width {
                x = 0;
                y += fh;
                if y + fh > height {
                    break;
                }
            }
            self.write_char(x as u16, y as u16, ch, font, color, background, mode);
            x += fw;
        }
        self.cursor = (
            x.min(u16::MAX as u32) as u16,
            y.min(u16::MAX as u32) as u16,
        );
    }

    /// Position following the last glyph drawn by [`write_string`](Self::write_string).
    pub fn cursor(&self) -> (u16, u16) {
        self.cursor
    }
}
