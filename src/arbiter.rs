//! SPI transaction-done interrupt handling.
//!
//! Several displays may share one SPI peripheral, each with its own chip-select. Only one
//! of them can have a transfer in flight, and that display is the one whose chip-select is
//! still low when the peripheral raises its done interrupt.

use crate::bus::SpiRegisters;
use crate::registry::Registry;

impl<B, const N: usize> Registry<B, N>
where
    B: SpiRegisters + 'static,
{
    /// Body of the SPI transaction-done interrupt for peripheral `spi`.
    ///
    /// Walks the display list in insertion order, skipping displays on other peripherals and
    /// displays whose chip-select is already high. The first match gets its interrupt status
    /// cleared and, unless the caller currently owns chip-select, its chip-select released.
    /// At most one display is serviced per call.
    pub fn transaction_done(&self, spi: &B) {
        critical_section::with(|cs| {
            let arena = self.arena.borrow_ref(cs);
            let Some(link) = arena
                .iter()
                .filter(|link| core::ptr::eq(link.spi, spi))
                .find(|link| link.is_selected())
            else {
                return;
            };

            spi.clear_interrupts();
            if !link.holds_cs() {
                link.deselect();
            }
        })
    }
}
