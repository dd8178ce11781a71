//! # SPI LCD Driver Stack
//!
//! A `no_std` driver for SPI attached TFT display controllers (ST7789, ILI9341 and friends)
//! built for dual-core microcontrollers with a DMA capable SPI peripheral.
//!
//! The driver talks to the hardware through two small traits instead of a concrete HAL:
//! [`SpiRegisters`] models the SPI peripheral's register block (busy flag, transmit buffer,
//! interrupt status and DMA out-link) and [`ControlLine`] models a GPIO output that can be
//! read back (chip-select, data/command, reset, backlight). Controller specifics live behind
//! the [`CommandSet`] trait, which hands out encoded command streams.
//!
//! ## Architecture
//!
//! - [`Registry`] creates and destroys [`Display`] handles and keeps the ordered list of all
//!   displays. Several displays may share one SPI peripheral, each with its own chip-select.
//! - [`Registry::transaction_done`] is the body of the SPI "transaction done" interrupt. It
//!   finds the display whose chip-select is still asserted and releases it.
//! - [`Display`] runs command streams, moves pixel data (polled or through a DMA descriptor
//!   chain) and rasterizes lines, circles, triangles and text.
//! - [`Renderer`] streams a region to the display in row bands: while one band is drained by
//!   DMA the next band is being composited, optionally split across both cores.
//!
//! ## Usage
//!
//! 1. Implement [`SpiRegisters`] for your SPI peripheral and [`ControlLine`] for your pins
//!    (or wrap an `embedded-hal` pin in [`PinLine`]).
//! 2. Put a [`Registry`] in a `static` and call [`Registry::transaction_done`] from the SPI
//!    interrupt handler.
//! 3. Add a display with a [`CommandSet`] and call [`Display::init`].
//! 4. Draw with the rasterizer methods, through `embedded-graphics`, or stream a scene with
//!    [`Renderer::render`].
//!
//! ```ignore
//! use spi_lcd::{Backlight, DisplaySize, PanelConfig, Registry, SpiConnection};
//! use spi_lcd::controllers::st7789::{self, St7789};
//!
//! static DISPLAYS: Registry<Spi3, 2> = Registry::new();
//!
//! let panel = PanelConfig::new(240, 240, st7789::CONTROLLER_SIZE);
//! let connection = SpiConnection {
//!     spi: &SPI3,
//!     dma: true,
//!     cs: Some(&CS),
//!     dc: Some(&DC),
//!     reset: Some(&RST),
//! };
//! let backlight = Backlight::new(Some(&BLK), 75);
//!
//! let mut display = DISPLAYS.add(panel, St7789::new(), connection, backlight, delay)?;
//! display.init();
//! display.fill(0x319bb1);
//! display.draw_filled_circle(120, 120, 40, spi_lcd::color::colors::YELLOW);
//! ```
//!
//! ## Pixel format
//!
//! Pixels are 16-bit RGB565 values sent in memory order. With the default
//! [`ByteOrder::Swapped`] policy the two bytes of each color are pre-swapped so that a
//! little-endian CPU puts the high byte on the wire first.
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
//!

#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod bus;
pub mod color;
pub mod commands;
pub mod controllers;
pub mod dma;
pub mod render;
pub mod text;

mod arbiter;
mod display;
mod graphics_core;
mod raster;
mod registry;
mod transfer;

#[cfg(test)]
mod sim;

pub use bus::{ControlLine, Line, PinLine, SpiConnection, SpiRegisters};
pub use color::ByteOrder;
pub use display::{Backlight, Display, DisplayState};
pub use registry::Registry;
pub use render::{Compositor, CoreSplit, Renderer, SingleCore};
pub use text::{Font, GlyphMode};

/// Width and height of a display or controller, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
}

impl DisplaySize {
    pub const fn new(width: u16, height: u16) -> Self {
        DisplaySize { width, height }
    }
}

/// Driver errors.
///
/// Only construction can fail. Drawing calls clip or silently do nothing on out of bounds
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// Invalid configuration provided to the driver.
    InvalidConfiguration(&'static str),
    /// Every slot of the display registry is taken.
    RegistryFull,
    /// The DMA descriptor chain or a render buffer could not be allocated.
    OutOfMemory,
}

impl core::fmt::Display for DriverError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DriverError::InvalidConfiguration(reason) => {
                write!(f, "invalid configuration: {reason}")
            }
            DriverError::RegistryFull => f.write_str("display registry is full"),
            DriverError::OutOfMemory => f.write_str("out of memory"),
        }
    }
}

/// Page orientation of the logical frame relative to the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
    PortraitMirror,
    LandscapeMirror,
}

impl Orientation {
    /// Returns true for the two landscape orientations, where width and height swap.
    pub const fn is_landscape(self) -> bool {
        matches!(self, Orientation::Landscape | Orientation::LandscapeMirror)
    }
}

/// Physical panel description used when adding a display to the [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// One side of the panel matrix, in pixels. Order does not matter: the smaller side
    /// becomes the portrait width.
    pub resolution1: u16,
    /// The other side of the panel matrix, in pixels.
    pub resolution2: u16,
    /// Largest matrix the controller can address in its native (portrait) orientation.
    pub controller: DisplaySize,
    /// Fixed column offset of the panel inside the controller RAM (portrait).
    pub w_offs: i32,
    /// Fixed row offset of the panel inside the controller RAM (portrait).
    pub h_offs: i32,
    /// Byte order of 16-bit pixels in memory.
    pub byte_order: ByteOrder,
}

impl PanelConfig {
    pub const fn new(resolution1: u16, resolution2: u16, controller: DisplaySize) -> Self {
        PanelConfig {
            resolution1,
            resolution2,
            controller,
            w_offs: 0,
            h_offs: 0,
            byte_order: ByteOrder::Swapped,
        }
    }

    /// Sets the fixed panel offsets inside the controller RAM.
    pub const fn with_offsets(mut self, w_offs: i32, h_offs: i32) -> Self {
        self.w_offs = w_offs;
        self.h_offs = h_offs;
        self
    }

    pub const fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }
}

/// Controller command tables.
///
/// Each method returns an encoded command stream, see [`commands`] for the format. The
/// returned slice may point into a buffer owned by the implementation that is patched on
/// every call (the window stream is the usual example).
///
/// `init` and `set_window` are mandatory. The remaining capabilities are optional: a
/// controller that does not support them returns `None` and the driver skips the step.
pub trait CommandSet: Send {
    /// Power-on initialization sequence.
    fn init(&mut self) -> &[u8];

    /// Sets the controller's active window (inclusive, controller RAM coordinates) and
    /// leaves the controller ready to receive pixel data.
    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> &[u8];

    /// Enters sleep mode.
    fn sleep_in(&mut self) -> Option<&[u8]> {
        None
    }

    /// Leaves sleep mode.
    fn sleep_out(&mut self) -> Option<&[u8]> {
        None
    }

    /// Programs the memory access order for `orientation`.
    fn set_orientation(&mut self, _orientation: Orientation) -> Option<&[u8]> {
        None
    }
}
