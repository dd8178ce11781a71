//! Command stream interpreter.
//!
//! Controller command tables are flat byte streams made of `(opcode, n, params...)` records:
//!
//! - `n < 20`: send `opcode` as a command byte followed by `n` parameter bytes as data.
//! - `20 <= n < 255`: pause for `n` milliseconds. The opcode byte is ignored.
//! - `n == 255`: end of stream.
//!
//! The end of the slice also ends the stream, as does a record whose parameters run past
//! the end of the slice.
//!
//! ```
//! use spi_lcd::commands::{Instruction, Instructions};
//!
//! let stream = [0x11, 0, 0, 120, 0x3A, 1, 0x55, 0, 255];
//! let mut decoded = Instructions::new(&stream);
//! assert_eq!(decoded.next(), Some(Instruction::Command { opcode: 0x11, params: &[] }));
//! assert_eq!(decoded.next(), Some(Instruction::Pause(120)));
//! assert_eq!(decoded.next(), Some(Instruction::Command { opcode: 0x3A, params: &[0x55] }));
//! assert_eq!(decoded.next(), None);
//! ```

use embedded_hal::delay::DelayNs;
use log::{trace, warn};

use crate::bus::{BusLink, SpiRegisters};

/// Length byte that terminates a stream.
pub const END_OF_STREAM: u8 = 255;
/// Length bytes at or above this value encode a pause in milliseconds.
pub const PAUSE_THRESHOLD: u8 = 20;

/// One decoded record of a command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    Command { opcode: u8, params: &'a [u8] },
    Pause(u8),
}

/// Decodes a command stream record by record.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    stream: &'a [u8],
    terminated: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(stream: &'a [u8]) -> Self {
        Instructions {
            stream,
            terminated: false,
        }
    }

    /// True once the explicit end marker has been read.
    pub fn terminated(&self) -> bool {
        self.terminated
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let stream = self.stream;
        let [opcode, len, rest @ ..] = stream else {
            self.stream = &[];
            return None;
        };

        match *len {
            END_OF_STREAM => {
                self.terminated = true;
                self.stream = &[];
                None
            }
            ms if ms >= PAUSE_THRESHOLD => {
                self.stream = rest;
                Some(Instruction::Pause(ms))
            }
            n => {
                let n = n as usize;
                if rest.len() < n {
                    self.stream = &[];
                    return None;
                }
                let (params, tail) = rest.split_at(n);
                self.stream = tail;
                Some(Instruction::Command {
                    opcode: *opcode,
                    params,
                })
            }
        }
    }
}

/// Sends `stream` to the display on `link`.
///
/// Chip-select is asserted for the whole stream unless the caller currently owns it. Every
/// command byte goes out with DC low and its parameters with DC high.
pub(crate) fn run<B, D>(link: &BusLink<B>, delay: &mut D, stream: &[u8])
where
    B: SpiRegisters,
    D: DelayNs,
{
    let spi = link.spi;
    spi.wait_idle();
    spi.clear_interrupts();

    let held = link.holds_cs();
    if !held {
        link.select();
    }

    let mut instructions = Instructions::new(stream);
    for instruction in instructions.by_ref() {
        match instruction {
            Instruction::Pause(ms) => delay.delay_ms(ms.into()),
            Instruction::Command { opcode, params } => {
                trace!("command {opcode:#04x}, {} parameter bytes", params.len());
                spi.wait_idle();
                link.command_mode();
                spi.load_tx(&[opcode]);
                spi.set_tx_len(1);
                spi.start();

                if params.is_empty() {
                    continue;
                }

                spi.wait_idle();
                spi.load_tx(params);
                link.data_mode();
                spi.set_tx_len(params.len());
                spi.start();
            }
        }
    }
    if !instructions.terminated() {
        warn!("command stream ended without terminator");
    }

    spi.wait_idle();
    if link.holds_dc() {
        link.data_mode();
    }
    if !held {
        link.deselect();
    }
}
