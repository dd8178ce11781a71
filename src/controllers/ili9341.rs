//! Command set for the Ilitek ILI9341 (240x320, 16-bit color over 4-wire SPI).

use super::{madctl, MadctlStream, WindowStream};
use crate::{CommandSet, DisplaySize, Orientation};

/// Controller RAM size in portrait orientation.
pub const CONTROLLER_SIZE: DisplaySize = DisplaySize::new(240, 320);

const CMD_SLEEPIN: u8 = 0x10;
const CMD_SLEEPOUT: u8 = 0x11;
const CMD_GAMMASET: u8 = 0x26;
const CMD_DISPLAYOFF: u8 = 0x28;
const CMD_DISPLAYON: u8 = 0x29;
const CMD_TEARINGEFFECTON: u8 = 0x35;
const CMD_PIXELFORMAT: u8 = 0x3A;
const CMD_FRAMECONTROLNORMAL: u8 = 0xB1;
const CMD_DISPLAYFUNC: u8 = 0xB6;
const CMD_ENTRYMODE: u8 = 0xB7;
const CMD_POWERCONTROL1: u8 = 0xC0;
const CMD_POWERCONTROL2: u8 = 0xC1;
const CMD_VCOMCONTROL1: u8 = 0xC5;
const CMD_VCOMCONTROL2: u8 = 0xC7;
const CMD_POWERCONTROLA: u8 = 0xCB;
const CMD_POWERCONTROLB: u8 = 0xCF;
const CMD_POSITIVEGAMMCORR: u8 = 0xE0;
const CMD_NEGATIVEGAMMCORR: u8 = 0xE1;
const CMD_DRIVERTIMCONTROLA: u8 = 0xE8;
const CMD_DRIVERTIMCONTROLC: u8 = 0xEA;
const CMD_POWERSEQCONTROL: u8 = 0xED;
const CMD_ENABLE3G: u8 = 0xF2;
const CMD_PUMPRATIOCONTROL: u8 = 0xF7;

const COLOR_MODE_16BIT: u8 = 0x55;

#[rustfmt::skip]
const INIT: &[u8] = &[
    CMD_DISPLAYOFF, 0,
    CMD_POWERCONTROLB, 4, 0, 0x00, 0x83, 0x30,
    CMD_POWERSEQCONTROL, 4, 0x64, 0x03, 0x12, 0x81,
    CMD_DRIVERTIMCONTROLA, 3, 0x85, 0x01, 0x79,
    CMD_POWERCONTROLA, 5, 0x39, 0x2C, 0x00, 0x34, 0x02,
    CMD_PUMPRATIOCONTROL, 1, 0x20,
    CMD_DRIVERTIMCONTROLC, 2, 0x00, 0x00,
    CMD_POWERCONTROL1, 1, 0x26,
    CMD_POWERCONTROL2, 1, 0x11,
    CMD_VCOMCONTROL1, 2, 0x35, 0x3E,
    CMD_VCOMCONTROL2, 1, 0xBE,
    CMD_PIXELFORMAT, 1, COLOR_MODE_16BIT,
    CMD_FRAMECONTROLNORMAL, 2, 0x00, 0x1B,
    CMD_ENABLE3G, 1, 0x08,
    CMD_GAMMASET, 1, 0x01,
    CMD_POSITIVEGAMMCORR, 15, 0x1F, 0x1A, 0x18, 0x0A, 0x0F, 0x06, 0x45, 0x87, 0x32, 0x0A, 0x07, 0x02, 0x07, 0x05, 0x00,
    CMD_NEGATIVEGAMMCORR, 15, 0x00, 0x25, 0x27, 0x05, 0x10, 0x09, 0x3A, 0x78, 0x4D, 0x05, 0x18, 0x0D, 0x38, 0x3A, 0x1F,
    CMD_ENTRYMODE, 1, 0x07,
    CMD_DISPLAYFUNC, 4, 0x0A, 0x82, 0x27, 0x00,
    CMD_TEARINGEFFECTON, 1, 1,
    CMD_SLEEPOUT, 0,
    0, 50,
    CMD_DISPLAYON, 0,
    0, 120,
    0, 255,
];

const SLEEP_IN: &[u8] = &[CMD_SLEEPIN, 0, 0, 30, 0, 255];
const SLEEP_OUT: &[u8] = &[CMD_SLEEPOUT, 0, 0, 120, 0, 255];

/// MADCTL value for each orientation. The panel is wired BGR.
pub const fn memory_access(orientation: Orientation) -> u8 {
    use madctl::*;
    match orientation {
        Orientation::Portrait => MX | BGR,
        Orientation::PortraitMirror => MY | BGR | ML | MH,
        Orientation::Landscape => MV | BGR | MH,
        Orientation::LandscapeMirror => MX | MY | MV | BGR | ML,
    }
}

/// ILI9341 command tables.
#[derive(Debug, Clone, Default)]
pub struct Ili9341 {
    window: WindowStream,
    orientation: MadctlStream,
}

impl Ili9341 {
    pub const fn new() -> Self {
        Ili9341 {
            window: WindowStream::new(),
            orientation: MadctlStream::new(),
        }
    }
}

impl CommandSet for Ili9341 {
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
