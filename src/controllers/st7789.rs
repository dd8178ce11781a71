//! Command set for the Sitronix ST7789 (240x320, 16-bit color over 4-wire SPI).

use super::{madctl, MadctlStream, WindowStream};
use crate::{CommandSet, DisplaySize, Orientation};

/// Controller RAM size in portrait orientation.
pub const CONTROLLER_SIZE: DisplaySize = DisplaySize::new(240, 320);

const CMD_SLPIN: u8 = 0x10;
const CMD_SLPOUT: u8 = 0x11;
const CMD_NORON: u8 = 0x13;
const CMD_INVON: u8 = 0x21;
const CMD_DISPOFF: u8 = 0x28;
const CMD_DISPON: u8 = 0x29;
const CMD_COLMOD: u8 = 0x3A;
const CMD_PORCTRL: u8 = 0xB2;
const CMD_GCTRL: u8 = 0xB7;
const CMD_VCOMS: u8 = 0xBB;
const CMD_LCMCTRL: u8 = 0xC0;
const CMD_VDVVRHEN: u8 = 0xC2;
const CMD_VRHS: u8 = 0xC3;
const CMD_VDVS: u8 = 0xC4;
const CMD_FRCTRL2: u8 = 0xC6;
const CMD_PWCTRL1: u8 = 0xD0;
const CMD_PVGAMCTRL: u8 = 0xE0;
const CMD_NVGAMCTRL: u8 = 0xE1;

const COLOR_MODE_16BIT: u8 = 0x55;

#[rustfmt::skip]
const INIT: &[u8] = &[
    CMD_DISPOFF, 0,
    CMD_COLMOD, 1, COLOR_MODE_16BIT,
    CMD_PORCTRL, 5, 0x0C, 0x0C, 0x00, 0x33, 0x33,
    CMD_GCTRL, 1, 0x35,
    CMD_VCOMS, 1, 0x19,
    CMD_LCMCTRL, 1, 0x2C,
    CMD_VDVVRHEN, 2, 0x01, 0xFF,
    CMD_VRHS, 1, 0x12,
    CMD_VDVS, 1, 0x20,
    CMD_FRCTRL2, 1, 0x0F,
    CMD_PWCTRL1, 2, 0xA4, 0xA1,
    CMD_PVGAMCTRL, 14, 0xD0, 0x04, 0x0D, 0x11, 0x13, 0x2B, 0x3F, 0x54, 0x4C, 0x18, 0x0D, 0x0B, 0x1F, 0x23,
    CMD_NVGAMCTRL, 14, 0xD0, 0x04, 0x0C, 0x11, 0x13, 0x2C, 0x3F, 0x44, 0x51, 0x2F, 0x1F, 0x1F, 0x20, 0x23,
    CMD_INVON, 0,
    CMD_SLPOUT, 0,
    0, 50,
    CMD_NORON, 0,
    CMD_DISPON, 0,
    0, 150,
    0, 255,
];

const SLEEP_IN: &[u8] = &[CMD_SLPIN, 0, 0, 30, 0, 255];
const SLEEP_OUT: &[u8] = &[CMD_SLPOUT, 0, 0, 120, 0, 255];

/// MADCTL value for each orientation.
pub const fn memory_access(orientation: Orientation) -> u8 {
    use madctl::*;
    match orientation {
        Orientation::Portrait => 0,
        Orientation::PortraitMirror => MX | MY | ML | MH,
        Orientation::Landscape => MX | MV | MH,
        Orientation::LandscapeMirror => MY | MV | ML,
    }
}

/// ST7789 command tables.
#[derive(Debug, Clone, Default)]
pub struct St7789 {
    window: WindowStream,
    orientation: MadctlStream,
}

impl St7789 {
    pub const fn new() -> Self {
        St7789 {
            window: WindowStream::new(),
            orientation: MadctlStream::new(),
        }
    }
}

impl CommandSet for St7789 {
    fn init(&mut self) -> &[u8] {
        INIT
    }

    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> &[u8] {
        self.window.patch(x0, y0, x1, y1)
    }

    fn sleep_in(&mut self) -> Option<&[u8]> {
        Some(SLEEP_IN)
    }

    fn sleep_out(&mut self) -> Option<&[u8]> {
        Some(SLEEP_OUT)
    }

    fn set_orientation(&mut self, orientation: Orientation) -> Option<&[u8]> {
        Some(self.orientation.patch(memory_access(orientation)))
    }
}
