//! Controller command sets.
//!
//! The building blocks here are shared by the bundled controllers and by custom
//! [`CommandSet`](crate::CommandSet) implementations: the MIPI DCS window stream and the
//! memory access control (MADCTL) bits.

#[cfg(feature = "ili9341")]
pub mod ili9341;
#[cfg(feature = "st7789")]
pub mod st7789;

/// Column address set.
pub const CASET: u8 = 0x2A;
/// Row address set.
pub const RASET: u8 = 0x2B;
/// Memory write.
pub const RAMWR: u8 = 0x2C;
/// Memory access control.
pub const MADCTL: u8 = 0x36;

/// MADCTL bits.
pub mod madctl {
    /// Row address order.
    pub const MY: u8 = 0x80;
    /// Column address order.
    pub const MX: u8 = 0x40;
    /// Row/column exchange.
    pub const MV: u8 = 0x20;
    /// Vertical refresh order.
    pub const ML: u8 = 0x10;
    /// BGR subpixel order.
    pub const BGR: u8 = 0x08;
    /// Horizontal refresh order.
    pub const MH: u8 = 0x04;
}

/// `CASET x0 x1, RASET y0 y1, RAMWR` with the coordinates patched in place.
#[derive(Debug, Clone)]
pub struct WindowStream {
    bytes: [u8; 16],
}

impl WindowStream {
    pub const fn new() -> Self {
        WindowStream {
            bytes: [CASET, 4, 0, 0, 0, 0, RASET, 4, 0, 0, 0, 0, RAMWR, 0, 0, 255],
        }
    }

    /// Writes the big-endian coordinates into the stream and returns it.
    pub fn patch(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> &[u8] {
        self.bytes[2..4].copy_from_slice(&x0.to_be_bytes());
        self.bytes[4..6].copy_from_slice(&x1.to_be_bytes());
        self.bytes[8..10].copy_from_slice(&y0.to_be_bytes());
        self.bytes[10..12].copy_from_slice(&y1.to_be_bytes());
        &self.bytes
    }
}

impl Default for WindowStream {
    fn default() -> Self {
        Self::new()
    }
}

/// `MADCTL value` with the value patched in place.
#[derive(Debug, Clone)]
pub struct MadctlStream {
    bytes: [u8; 5],
}

impl MadctlStream {
    pub const fn new() -> Self {
        MadctlStream {
            bytes: [MADCTL, 1, 0, 0, 255],
        }
    }

    pub fn patch(&mut self, value: u8) -> &[u8] {
        self.bytes[2] = value;
        &self.bytes
    }
}

impl Default for MadctlStream {
    fn default() -> Self {
        Self::new()
    }
}
