//! Simulated hardware for unit tests.
//!
//! [`MockSpi`] records every transaction together with the DC level, walking DMA descriptor
//! chains the way the hardware would. By default a DMA transfer completes inside `start`;
//! with [`MockSpi::defer_dma`] it stays in flight and its source is read only when the bus
//! is waited on. [`Panel`] replays those transactions as a
//! controller would: CASET/RASET set the window and RAMWR data fills it.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::boxed::Box;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::bus::{ControlLine, SpiConnection, SpiRegisters, TX_BUFFER_BYTES};
use crate::controllers::{MadctlStream, WindowStream, CASET, RAMWR, RASET};
use crate::dma::{DmaDescriptor, Link};
use crate::{Backlight, CommandSet, Display, DisplaySize, DriverError, Orientation, PanelConfig};
use crate::Registry;

pub const CONTROLLER: DisplaySize = DisplaySize::new(240, 320);
pub const INIT_PAUSE_MS: u8 = 120;

pub struct MockLine {
    level: AtomicBool,
    history: Mutex<Vec<bool>>,
}

impl MockLine {
    pub fn leak(initial: bool) -> &'static MockLine {
        Box::leak(Box::new(MockLine {
            level: AtomicBool::new(initial),
            history: Mutex::new(Vec::new()),
        }))
    }

    /// Every level written so far, oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.history.lock().unwrap().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap().clear();
    }

    fn drive(&self, high: bool) {
        self.level.store(high, Ordering::SeqCst);
        self.history.lock().unwrap().push(high);
    }
}

impl ControlLine for MockLine {
    fn set_high(&self) {
        self.drive(true);
    }

    fn set_low(&self) {
        self.drive(false);
    }

    fn is_set_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

/// One started SPI transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// DC level: false for command bytes, true for data.
    pub data: bool,
    pub dma: bool,
    pub bytes: Vec<u8>,
}

impl Transfer {
    pub fn command(opcode: u8) -> Self {
        Transfer {
            data: false,
            dma: false,
            bytes: vec![opcode],
        }
    }

    pub fn data(bytes: &[u8]) -> Self {
        Transfer {
            data: true,
            dma: false,
            bytes: bytes.to_vec(),
        }
    }
}

/// A DMA transfer that has been started but not read yet.
struct InFlight {
    chain: Vec<DmaDescriptor>,
    len: usize,
    data: bool,
}

#[derive(Default)]
struct SpiState {
    tx: Vec<u8>,
    tx_len: usize,
    chain: Vec<DmaDescriptor>,
    out_link_started: bool,
    in_flight: Option<InFlight>,
    done_irq: bool,
    interrupt_clears: usize,
    last_chain_len: usize,
    dma_sources: Vec<usize>,
    transfers: Vec<Transfer>,
}

impl SpiState {
    fn complete(&mut self, dma: InFlight) {
        let (bytes, walked) = walk_chain(&dma.chain, dma.len);
        self.last_chain_len = walked;
        self.transfers.push(Transfer {
            data: dma.data,
            dma: true,
            bytes,
        });
    }
}

pub struct MockSpi {
    dc: Option<&'static MockLine>,
    busy: AtomicBool,
    defer_dma: AtomicBool,
    state: Mutex<SpiState>,
}

// Descriptors hold raw pointers; the mock only reads them while the transfer that installed
// them is being started.
unsafe impl Send for MockSpi {}
unsafe impl Sync for MockSpi {}

impl MockSpi {
    pub fn leak(dc: Option<&'static MockLine>) -> &'static MockSpi {
        Box::leak(Box::new(MockSpi {
            dc,
            busy: AtomicBool::new(false),
            defer_dma: AtomicBool::new(false),
            state: Mutex::new(SpiState::default()),
        }))
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().transfers.clear();
    }

    pub fn interrupt_clears(&self) -> usize {
        self.state.lock().unwrap().interrupt_clears
    }

    pub fn done_interrupt_enabled(&self) -> bool {
        self.state.lock().unwrap().done_irq
    }

    /// Number of descriptors walked by the last DMA transfer.
    pub fn last_chain_len(&self) -> usize {
        self.state.lock().unwrap().last_chain_len
    }

    /// Start address of the source buffer of every DMA transfer, oldest first.
    pub fn dma_sources(&self) -> Vec<usize> {
        self.state.lock().unwrap().dma_sources.clone()
    }

    /// Sets the busy flag. Clearing it completes a deferred DMA transfer.
    pub fn set_busy(&self, busy: bool) {
        if !busy {
            self.finish_dma();
        }
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// Keeps each DMA transfer in flight, with the bus busy, until the bus is waited on or
    /// [`finish_dma`](Self::finish_dma) is called. The source is read at completion.
    pub fn defer_dma(&self, defer: bool) {
        self.defer_dma.store(defer, Ordering::SeqCst);
    }

    /// Completes the DMA transfer in flight, if any.
    pub fn finish_dma(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(dma) = state.in_flight.take() {
            state.complete(dma);
            self.busy.store(false, Ordering::SeqCst);
        }
    }
}

/// Reads `len` bytes by following `chain` from its first descriptor.
fn walk_chain(chain: &[DmaDescriptor], len: usize) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(len);
    let mut visited = BTreeSet::new();
    let mut index = 0;
    while out.len() < len {
        let desc = chain[index];
        visited.insert(index);
        let take = (desc.length as usize).min(len - out.len());
        // SAFETY: the driver keeps the source alive until the transfer completes, and a
        // deferred transfer completes before the bus is reported idle.
        let bytes = unsafe { core::slice::from_raw_parts(desc.buf, take) };
        out.extend_from_slice(bytes);
        match desc.next {
            Link::Next(next) => index = next,
            Link::End => {
                assert!(desc.eof, "last descriptor must carry EOF");
                break;
            }
        }
    }
    (out, visited.len())
}

impl SpiRegisters for MockSpi {
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn wait_idle(&self) {
        self.finish_dma();
        assert!(!self.is_busy(), "waiting on a bus that never goes idle");
    }

    fn load_tx(&self, bytes: &[u8]) {
        assert!(bytes.len() <= TX_BUFFER_BYTES);
        self.state.lock().unwrap().tx = bytes.to_vec();
    }

    fn set_tx_len(&self, bytes: usize) {
        self.state.lock().unwrap().tx_len = bytes;
    }

    fn start(&self) {
        assert!(!self.is_busy(), "transaction started while busy");
        let data = self.dc.map_or(true, |dc| dc.is_set_high());
        let mut state = self.state.lock().unwrap();
        let len = state.tx_len;

        if state.out_link_started {
            state.out_link_started = false;
            let chain = core::mem::take(&mut state.chain);
            let source = chain.first().map_or(0, |desc| desc.buf as usize);
            state.dma_sources.push(source);
            let dma = InFlight { chain, len, data };
            if self.defer_dma.load(Ordering::SeqCst) {
                state.in_flight = Some(dma);
                self.busy.store(true, Ordering::SeqCst);
            } else {
                state.complete(dma);
            }
            return;
        }

        assert!(len <= state.tx.len(), "transaction longer than loaded data");
        let bytes = state.tx[..len].to_vec();
        state.transfers.push(Transfer {
            data,
            dma: false,
            bytes,
        });
    }

    fn clear_interrupts(&self) {
        let mut state = self.state.lock().unwrap();
        state.interrupt_clears += 1;
        state.done_irq = false;
    }

    fn enable_done_interrupt(&self) {
        self.state.lock().unwrap().done_irq = true;
    }

    fn load_out_link(&self, chain: &[DmaDescriptor]) {
        self.state.lock().unwrap().chain = chain.to_vec();
    }

    fn reset_dma(&self) {}

    fn start_out_link(&self) {
        self.state.lock().unwrap().out_link_started = true;
    }

    fn out_fifo_primed(&self) -> bool {
        self.state.lock().unwrap().out_link_started
    }
}

/// Delay that only adds up the requested time.
#[derive(Clone, Default)]
pub struct Ticks(Arc<AtomicU64>);

impl Ticks {
    pub fn millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst) / 1_000_000
    }
}

impl DelayNs for Ticks {
    fn delay_ns(&mut self, ns: u32) {
        self.0.fetch_add(ns as u64, Ordering::SeqCst);
    }
}

/// Command set with a switchable orientation capability.
pub struct TestCommands {
    window: WindowStream,
    madctl: MadctlStream,
    orientation: Arc<AtomicBool>,
}

/// Test side handle of a [`TestCommands`] moved into a display.
#[derive(Clone)]
pub struct CommandSwitch(Arc<AtomicBool>);

impl CommandSwitch {
    pub fn disable_orientation(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TestCommands {
    pub fn new() -> (Self, CommandSwitch) {
        let orientation = Arc::new(AtomicBool::new(true));
        (
            TestCommands {
                window: WindowStream::new(),
                madctl: MadctlStream::new(),
                orientation: Arc::clone(&orientation),
            },
            CommandSwitch(orientation),
        )
    }
}

impl CommandSet for TestCommands {
    fn init(&mut self) -> &[u8] {
        const INIT: &[u8] = &[0x01, 0, 0, INIT_PAUSE_MS, 0x11, 0, 0x29, 0, 0, 255];
        INIT
    }

    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> &[u8] {
        self.window.patch(x0, y0, x1, y1)
    }

    fn sleep_in(&mut self) -> Option<&[u8]> {
        Some(&[0x10, 0, 0, 30, 0, 255])
    }

    fn sleep_out(&mut self) -> Option<&[u8]> {
        Some(&[0x11, 0, 0, 120, 0, 255])
    }

    fn set_orientation(&mut self, orientation: Orientation) -> Option<&[u8]> {
        if !self.orientation.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.madctl.patch(orientation as u8))
    }
}

pub fn panel(resolution1: u16, resolution2: u16) -> PanelConfig {
    PanelConfig::new(resolution1, resolution2, CONTROLLER)
}

/// A registry that lives as long as the displays taken from it.
pub fn registry<const N: usize>() -> &'static Registry<MockSpi, N> {
    Box::leak(Box::new(Registry::new()))
}

pub fn add<const N: usize>(
    registry: &'static Registry<MockSpi, N>,
    spi: &'static MockSpi,
    panel: PanelConfig,
    dma: bool,
) -> Result<Display<MockSpi, Ticks>, DriverError> {
    add_on(registry, spi, MockLine::leak(true), panel, dma)
}

pub fn add_on<const N: usize>(
    registry: &'static Registry<MockSpi, N>,
    spi: &'static MockSpi,
    cs: &'static MockLine,
    panel: PanelConfig,
    dma: bool,
) -> Result<Display<MockSpi, Ticks>, DriverError> {
    let connection = SpiConnection {
        spi,
        dma,
        cs: Some(cs),
        dc: None,
        reset: None,
    };
    registry.add(
        panel,
        TestCommands::new().0,
        connection,
        Backlight::new(None, 100),
        Ticks::default(),
    )
}

/// A display wired to simulated hardware.
pub struct Rig {
    pub registry: &'static Registry<MockSpi, 4>,
    pub display: Display<MockSpi, Ticks>,
    pub spi: &'static MockSpi,
    pub cs: &'static MockLine,
    pub reset: &'static MockLine,
    pub backlight: &'static MockLine,
    pub ticks: Ticks,
    pub commands: CommandSwitch,
}

impl Rig {
    /// Replays everything sent so far into a fresh panel.
    pub fn panel(&self) -> Panel {
        Panel::replay(&self.spi.transfers(), CONTROLLER)
    }
}

pub fn rig(width: u16, height: u16, dma: bool) -> Rig {
    rig_with(panel(width, height), dma)
}

pub fn rig_with(panel: PanelConfig, dma: bool) -> Rig {
    let registry = registry::<4>();
    let cs = MockLine::leak(true);
    let dc = MockLine::leak(true);
    let reset = MockLine::leak(true);
    let backlight = MockLine::leak(false);
    let spi = MockSpi::leak(Some(dc));
    let ticks = Ticks::default();
    let (commands, switch) = TestCommands::new();

    let display = registry
        .add(
            panel,
            commands,
            SpiConnection {
                spi,
                dma,
                cs: Some(cs),
                dc: Some(dc),
                reset: Some(reset),
            },
            Backlight::new(Some(backlight), 100),
            ticks.clone(),
        )
        .unwrap();

    Rig {
        registry,
        display,
        spi,
        cs,
        reset,
        backlight,
        ticks,
        commands: switch,
    }
}

/// Controller RAM reconstructed from the bus traffic.
pub struct Panel {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Option<u16>>,
    /// Number of RAMWR commands seen.
    pub windows: usize,
}

impl Panel {
    pub fn replay(transfers: &[Transfer], size: DisplaySize) -> Panel {
        let (width, height) = (size.width as usize, size.height as usize);
        let mut panel = Panel {
            width,
            height,
            pixels: vec![None; width * height],
            windows: 0,
        };

        let mut command = None;
        let mut params = Vec::new();
        let (mut x0, mut x1, mut y0, mut y1) = (0usize, 0usize, 0usize, 0usize);
        let (mut x, mut y) = (0usize, 0usize);

        for transfer in transfers {
            if !transfer.data {
                command = transfer.bytes.first().copied();
                params.clear();
                if command == Some(RAMWR) {
                    panel.windows += 1;
                    (x, y) = (x0, y0);
                }
                continue;
            }
            match command {
                Some(CASET) | Some(RASET) => {
                    params.extend_from_slice(&transfer.bytes);
                    if params.len() >= 4 {
                        let start = u16::from_be_bytes([params[0], params[1]]) as usize;
                        let end = u16::from_be_bytes([params[2], params[3]]) as usize;
                        if command == Some(CASET) {
                            (x0, x1) = (start, end);
                        } else {
                            (y0, y1) = (start, end);
                        }
                    }
                }
                Some(RAMWR) => {
                    for pair in transfer.bytes.chunks_exact(2) {
                        if x < width && y < height && y <= y1 {
                            panel.pixels[y * width + x] = Some(u16::from_ne_bytes([pair[0], pair[1]]));
                        }
                        x += 1;
                        if x > x1 {
                            x = x0;
                            y += 1;
                        }
                    }
                }
                _ => {}
            }
        }
        panel
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels[y * self.width + x]
    }

    /// Coordinates of every written pixel.
    pub fn lit(&self) -> BTreeSet<(usize, usize)> {
        self.pixels
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_some())
            .map(|(i, _)| (i % self.width, i / self.width))
            .collect()
    }

    pub fn count(&self, value: u16) -> usize {
        self.pixels.iter().filter(|&&p| p == Some(value)).count()
    }
}
