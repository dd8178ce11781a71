//! Pixel format conversion.
//!
//! The driver always runs the controller in 16-bit RGB565 mode. Colors come in either as
//! 8-bit channels, as packed `0xRRGGBB` values, or as `embedded-graphics` colors, and leave
//! as the 16-bit value that is written to pixel memory. With [`ByteOrder::Swapped`] that
//! value has its bytes exchanged so a little-endian CPU sends the high byte first.

use embedded_graphics_core::pixelcolor::{IntoStorage, Rgb565, Rgb888, RgbColor};

/// Byte order of 16-bit pixels in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// High byte at the lower address, which is what the controller expects on the wire
    /// when the CPU is little-endian.
    #[default]
    Swapped,
    /// Native CPU order.
    Native,
}

impl ByteOrder {
    #[inline]
    pub const fn apply(self, color: u16) -> u16 {
        match self {
            ByteOrder::Swapped => color.swap_bytes(),
            ByteOrder::Native => color,
        }
    }
}

/// Packs three 8-bit channels into RGB565.
#[inline]
pub const fn rgb565(r: u8, g: u8, b: u8, order: ByteOrder) -> u16 {
    let color = ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3);
    order.apply(color)
}

/// Converts a packed `0xRRGGBB` color to RGB565.
#[inline]
pub const fn rgb888_to_565(color: u32, order: ByteOrder) -> u16 {
    rgb565((color >> 16) as u8, (color >> 8) as u8, color as u8, order)
}

/// Doubles a 16-bit pixel into a 32-bit fill word.
#[inline]
pub const fn fill_word(color16: u16) -> u32 {
    color16 as u32 | (color16 as u32) << 16
}

pub fn from_rgb565(color: Rgb565, order: ByteOrder) -> u16 {
    order.apply(color.into_storage())
}

pub fn from_rgb888(color: Rgb888, order: ByteOrder) -> u16 {
    rgb565(color.r(), color.g(), color.b(), order)
}

/// Common 24-bit colors.
pub mod colors {
    pub const BLACK: u32 = 0x000000;
    pub const NAVY: u32 = 0x000080;
    pub const DARKGREEN: u32 = 0x006400;
    pub const DARKCYAN: u32 = 0x008B8B;
    pub const MAROON: u32 = 0x800000;
    pub const PURPLE: u32 = 0x800080;
    pub const OLIVE: u32 = 0x808000;
    pub const LIGHTGREY: u32 = 0xD3D3D3;
    pub const DARKGREY: u32 = 0xA9A9A9;
    pub const BLUE: u32 = 0x0000FF;
    pub const GREEN: u32 = 0x00FF00;
    pub const CYAN: u32 = 0x00FFFF;
    pub const RED: u32 = 0xFF0000;
    pub const MAGENTA: u32 = 0xFF00FF;
    pub const YELLOW: u32 = 0xFFFF00;
    pub const WHITE: u32 = 0xFFFFFF;
    pub const ORANGE: u32 = 0xFFA500;
    pub const GREENYELLOW: u32 = 0xADFF2F;
    pub const PINK: u32 = 0xFFC0CB;
}
