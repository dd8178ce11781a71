//! Pixel transfer engine: polled bursts through the transmit buffer or DMA chains.

use core::hint::spin_loop;

use embedded_hal::delay::DelayNs;
use log::{trace, warn};

use crate::bus::{SpiRegisters, TX_BUFFER_BYTES};
use crate::color::fill_word;
use crate::display::Display;
use crate::dma::DmaDescriptor;

/// Packs 16-bit pixels into the transmit buffer and starts a transaction whenever it is
/// full.
pub(crate) struct Burst<'a, B: SpiRegisters> {
    spi: &'a B,
    buf: [u8; TX_BUFFER_BYTES],
    len: usize,
}

impl<'a, B: SpiRegisters> Burst<'a, B> {
    pub(crate) fn new(spi: &'a B) -> Self {
        spi.wait_idle();
        Burst {
            spi,
            buf: [0; TX_BUFFER_BYTES],
            len: 0,
        }
    }

    pub(crate) fn push(&mut self, pixel: u16) {
        self.buf[self.len..self.len + 2].copy_from_slice(&pixel.to_ne_bytes());
        self.len += 2;
        if self.len == TX_BUFFER_BYTES {
            self.flush();
        }
    }

    pub(crate) fn repeat(&mut self, pixel: u16, count: usize) {
        for _ in 0..count {
            self.push(pixel);
        }
    }

    fn flush(&mut self) {
        if self.len == 0 {
            return;
        }
        self.spi.wait_idle();
        self.spi.load_tx(&self.buf[..self.len]);
        self.spi.set_tx_len(self.len);
        self.spi.start();
        self.len = 0;
    }

    /// Sends whatever is left and waits for the bus.
    pub(crate) fn finish(mut self) {
        self.flush();
        self.spi.wait_idle();
    }
}

/// Hands a prepared chain to the peripheral and starts the transaction.
///
/// Returns once the DMA engine has primed the FIFO. Completion is signalled through the
/// transaction-done interrupt.
fn start_dma<B: SpiRegisters>(spi: &B, chain: &[DmaDescriptor], bytes: usize) {
    spi.set_tx_len(bytes);
    spi.load_out_link(chain);
    spi.reset_dma();
    spi.start_out_link();
    while !spi.out_fifo_primed() {
        spin_loop();
    }
    spi.clear_interrupts();
    spi.enable_done_interrupt();
    spi.start();
}

impl<B, D> Display<B, D>
where
    B: SpiRegisters + 'static,
    D: DelayNs,
{
    /// Sends pixels through the transmit buffer, 32 pixels per transaction, and waits for
    /// the last one.
    ///
    /// Chip-select and data mode are the caller's business: set the window, then select.
    pub fn write_data(&mut self, data: &[u16]) {
        if data.is_empty() {
            return;
        }
        let mut burst = Burst::new(self.link.spi);
        for &pixel in data {
            burst.push(pixel);
        }
        burst.finish();
    }

    /// Streams pixels through DMA and returns without waiting for completion.
    ///
    /// Falls back to [`write_data`](Self::write_data) when the display has no DMA or the
    /// data does not fit the descriptor chain.
    pub fn write_data_dma(&mut self, data: &'static [u16]) {
        // SAFETY: `data` lives forever and is shared, so nothing can change it mid transfer.
        unsafe { self.write_data_dma_unchecked(data) };
    }

    /// Like [`write_data_dma`](Self::write_data_dma) for borrowed buffers.
    ///
    /// Returns true if the transfer was queued on DMA, false if it ran synchronously.
    ///
    /// # Safety
    ///
    /// `data` must stay valid and unmodified until the SPI peripheral is idle again, which
    /// is the case once any later call on a display sharing this peripheral returns or
    /// [`wait_idle`](Self::wait_idle) does.
    pub unsafe fn write_data_dma_unchecked(&mut self, data: &[u16]) -> bool {
        if data.is_empty() {
            return false;
        }
        let bytes = data.len() * 2;
        if !self.link.dma {
            self.write_data(data);
            return false;
        }
        if !self.chain.fits(bytes) {
            warn!(
                "display {}: {bytes} bytes exceed the descriptor chain, sending synchronously",
                self.number
            );
            self.write_data(data);
            return false;
        }

        let spi = self.link.spi;
        spi.wait_idle();
        let chain = self.chain.build(data.as_ptr().cast(), bytes);
        trace!("dma: {bytes} bytes in {} descriptors", chain.len());
        start_dma(spi, chain, bytes);
        true
    }

    /// Sends `count` copies of `color16` into the current window.
    ///
    /// With DMA the transfer is left running and the interrupt releases chip-select.
    pub(crate) fn stream_fill(&mut self, color16: u16, count: usize) {
        let spi = self.link.spi;
        spi.wait_idle();
        self.link.select();
        self.link.data_mode();

        if self.link.dma && self.chain.capacity() > 0 {
            *self.fill_word = fill_word(color16);
            let word: *const u32 = &*self.fill_word;
            let chain = self.chain.build_fill(word);
            start_dma(spi, chain, count * 2);
            return;
        }

        let mut burst = Burst::new(spi);
        burst.repeat(color16, count);
        burst.finish();
        self.release_cs();
    }

    /// Streams pixels into the current window, through DMA when available.
    pub(crate) fn stream_pixels(&mut self, data: &[u16], dma: bool) {
        self.link.select();
        self.link.data_mode();
        // SAFETY: callers only pass `dma` for `'static` data.
        let queued = dma && unsafe { self.write_data_dma_unchecked(data) };
        if !queued {
            if !dma {
                self.write_data(data);
            }
            self.release_cs();
        }
    }

    pub(crate) fn release_cs(&self) {
        if !self.link.holds_cs() {
            self.link.deselect();
        }
    }

    /// Copies a `width` x `height` image to `(x, y)`, polled.
    ///
    /// Does nothing unless the whole image lies inside the display and `data` holds at least
    /// `width * height` pixels.
    pub fn draw_image(&mut self, x: u16, y: u16, width: u16, height: u16, data: &[u16]) {
        if let Some(pixels) = self.image_window(x, y, width, height, data.len()) {
            self.stream_pixels(&data[..pixels], false);
        }
    }

    /// Copies a `width` x `height` image to `(x, y)` through DMA.
    ///
    /// Returns before the transfer completes; chip-select is released from the interrupt.
    pub fn draw_image_dma(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        data: &'static [u16],
    ) {
        if let Some(pixels) = self.image_window(x, y, width, height, data.len()) {
            self.stream_pixels(&data[..pixels], true);
        }
    }

    fn image_window(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        available: usize,
    ) -> Option<usize> {
        let pixels = width as usize * height as usize;
        if pixels == 0
            || x as u32 + width as u32 > self.width() as u32
            || y as u32 + height as u32 > self.height() as u32
            || available < pixels
        {
            return None;
        }
        self.set_active_window(x, y, x + width - 1, y + height - 1);
        Some(pixels)
    }
}
