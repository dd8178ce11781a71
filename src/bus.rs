//! Hardware seams: the SPI register block and the GPIO control lines.
//!
//! [`SpiRegisters`] is deliberately register shaped. The driver needs to poll the busy flag,
//! fill the 64 byte transmit buffer, arm the transaction-done interrupt and hand the
//! peripheral a DMA descriptor chain, which a blocking `SpiBus` abstraction cannot express.
//! Every method takes `&self` because the same peripheral is touched from the interrupt
//! handler while a display handle is alive.

use alloc::sync::Arc;
use core::cell::RefCell;
use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use embedded_hal::digital::StatefulOutputPin;

use crate::dma::DmaDescriptor;

/// Size of the peripheral's transmit buffer registers, in bytes.
pub const TX_BUFFER_BYTES: usize = 64;

/// Register level access to one SPI peripheral.
pub trait SpiRegisters: Sync {
    /// True while a transaction is in progress.
    fn is_busy(&self) -> bool;

    /// Spins until the current transaction is finished.
    fn wait_idle(&self) {
        while self.is_busy() {
            core::hint::spin_loop();
        }
    }

    /// Copies up to [`TX_BUFFER_BYTES`] bytes into the transmit buffer.
    fn load_tx(&self, bytes: &[u8]);

    /// Sets the length of the next transaction, in bytes.
    fn set_tx_len(&self, bytes: usize);

    /// Starts a transaction.
    fn start(&self);

    /// Clears every pending interrupt status bit and disables all interrupt sources.
    fn clear_interrupts(&self);

    /// Enables the transaction-done interrupt.
    fn enable_done_interrupt(&self);

    /// Points the DMA out-link at the first descriptor of `chain`.
    fn load_out_link(&self, chain: &[DmaDescriptor]);

    /// Resets the DMA engine state.
    fn reset_dma(&self);

    /// Starts fetching descriptors from the out-link.
    fn start_out_link(&self);

    /// True once the DMA engine has pushed data into the outbound FIFO.
    fn out_fifo_primed(&self) -> bool;
}

/// A GPIO output that can be driven and read back.
///
/// Implementations must be usable from interrupt context.
pub trait ControlLine: Sync {
    fn set_high(&self);
    fn set_low(&self);
    fn is_set_high(&self) -> bool;
}

/// A control line shared between the display handle and the interrupt handler.
pub type Line = &'static dyn ControlLine;

/// Adapts an `embedded-hal` output pin to [`ControlLine`].
///
/// ```ignore
/// static CS: PinLine<Output<'static>> = ...;
/// ```
pub struct PinLine<P> {
    pin: Mutex<RefCell<P>>,
}

impl<P> PinLine<P> {
    pub const fn new(pin: P) -> Self {
        PinLine {
            pin: Mutex::new(RefCell::new(pin)),
        }
    }
}

impl<P> ControlLine for PinLine<P>
where
    P: StatefulOutputPin<Error = Infallible> + Send,
{
    fn set_high(&self) {
        critical_section::with(|cs| {
            infallible(self.pin.borrow_ref_mut(cs).set_high());
        })
    }

    fn set_low(&self) {
        critical_section::with(|cs| {
            infallible(self.pin.borrow_ref_mut(cs).set_low());
        })
    }

    fn is_set_high(&self) -> bool {
        critical_section::with(|cs| infallible(self.pin.borrow_ref_mut(cs).is_set_high()))
    }
}

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// How a display is wired to the SPI peripheral.
pub struct SpiConnection<B: 'static> {
    pub spi: &'static B,
    /// Use DMA for pixel transfers.
    pub dma: bool,
    /// Chip-select, active low.
    pub cs: Option<Line>,
    /// Data/command select: low for commands, high for data.
    pub dc: Option<Line>,
    /// Hardware reset, active low.
    pub reset: Option<Line>,
}

impl<B: 'static> Clone for SpiConnection<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: 'static> Copy for SpiConnection<B> {}

/// Bus state of one display, shared with the registry so the interrupt handler can see it.
pub(crate) struct BusLink<B: 'static> {
    pub(crate) spi: &'static B,
    pub(crate) dma: bool,
    cs: Option<Line>,
    dc: Option<Line>,
    pub(crate) reset: Option<Line>,
    /// The caller owns chip-select for a multi-transfer sequence.
    cs_control: AtomicBool,
    /// The caller owns data/command for a multi-transfer sequence.
    dc_control: AtomicBool,
}

impl<B: 'static> BusLink<B> {
    pub(crate) fn new(connection: SpiConnection<B>) -> Arc<Self> {
        Arc::new(BusLink {
            spi: connection.spi,
            dma: connection.dma,
            cs: connection.cs,
            dc: connection.dc,
            reset: connection.reset,
            cs_control: AtomicBool::new(false),
            dc_control: AtomicBool::new(false),
        })
    }

    pub(crate) fn select(&self) {
        if let Some(cs) = self.cs {
            cs.set_low();
        }
    }

    pub(crate) fn deselect(&self) {
        if let Some(cs) = self.cs {
            cs.set_high();
        }
    }

    /// True while chip-select is asserted. A display without a CS line is always selected.
    pub(crate) fn is_selected(&self) -> bool {
        self.cs.map_or(true, |cs| !cs.is_set_high())
    }

    pub(crate) fn command_mode(&self) {
        if let Some(dc) = self.dc {
            dc.set_low();
        }
    }

    pub(crate) fn data_mode(&self) {
        if let Some(dc) = self.dc {
            dc.set_high();
        }
    }

    pub(crate) fn holds_cs(&self) -> bool {
        self.cs_control.load(Ordering::Acquire)
    }

    pub(crate) fn holds_dc(&self) -> bool {
        self.dc_control.load(Ordering::Acquire)
    }

    /// Takes or gives back ownership of both control lines.
    pub(crate) fn hold_lines(&self, hold: bool) {
        self.dc_control.store(hold, Ordering::Release);
        self.cs_control.store(hold, Ordering::Release);
    }
}
