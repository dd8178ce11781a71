//! Pipelined band renderer.
//!
//! A region is streamed top to bottom in bands of a few rows. Each band is composited into a
//! scratch buffer and handed to the transfer engine. With DMA and two buffers the renderer
//! composites band N+1 into one buffer while band N drains from the other.
//!
//! A band can be split across two cores through [`CoreSplit`]: the compositor runs on both
//! halves of the buffer at the same time and the renderer waits for both halves to signal
//! done before the buffer is sent.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, Ordering};

use embedded_hal::delay::DelayNs;
use log::{debug, trace, warn};

use crate::bus::SpiRegisters;
use crate::display::Display;
use crate::DriverError;

/// Default band height, in rows.
pub const BAND_LINES: usize = 8;

/// Produces pixels for a region of the scene.
pub trait Compositor: Sync {
    /// Fills `dst` row-major with the inclusive rectangle `(x0, y0)..=(x1, y1)`.
    ///
    /// Called concurrently on disjoint destinations when the band is split across cores.
    fn render_region(&self, x0: i32, y0: i32, x1: i32, y1: i32, dst: &mut [u16]);
}

impl<F> Compositor for F
where
    F: Fn(i32, i32, i32, i32, &mut [u16]) + Sync,
{
    fn render_region(&self, x0: i32, y0: i32, x1: i32, y1: i32, dst: &mut [u16]) {
        self(x0, y0, x1, y1, dst)
    }
}

/// Runs two jobs, possibly in parallel on two cores.
///
/// Implementations must run both jobs to completion before returning. On a dual-core chip
/// the second job is usually posted to the other core's executor while the first runs
/// inline.
pub trait CoreSplit {
    fn split<A, Z>(&mut self, first: A, second: Z)
    where
        A: FnOnce() + Send,
        Z: FnOnce() + Send;

    /// False if the jobs would just run back to back, in which case bands are not split.
    fn parallel(&self) -> bool {
        true
    }
}

/// Runs everything on the calling core.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleCore;

impl CoreSplit for SingleCore {
    fn split<A, Z>(&mut self, first: A, second: Z)
    where
        A: FnOnce() + Send,
        Z: FnOnce() + Send,
    {
        first();
        second();
    }

    fn parallel(&self) -> bool {
        false
    }
}

/// Counting semaphore signalled by each half of a split band.
#[derive(Debug, Default)]
pub(crate) struct Done {
    count: AtomicU8,
}

impl Done {
    pub(crate) const fn new() -> Self {
        Done {
            count: AtomicU8::new(0),
        }
    }

    pub(crate) fn give(&self) {
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Spins until a signal is available and consumes it.
    pub(crate) fn take(&self) {
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current > 0
                && self
                    .count
                    .compare_exchange_weak(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                return;
            }
            core::hint::spin_loop();
        }
    }
}

/// Streams regions to a display in row bands.
pub struct Renderer {
    front: &'static mut [u16],
    back: Option<&'static mut [u16]>,
    band_lines: usize,
    done: Done,
}

impl Renderer {
    /// Uses caller provided scratch buffers.
    ///
    /// DMA pipelining needs `back`; without it every band is sent synchronously. Both
    /// buffers must have the same length.
    pub fn new_static(
        band_lines: usize,
        front: &'static mut [u16],
        back: Option<&'static mut [u16]>,
    ) -> Result<Self, DriverError> {
        if band_lines == 0 {
            return Err(DriverError::InvalidConfiguration("band height must be non-zero"));
        }
        if front.is_empty() || back.as_ref().is_some_and(|back| back.len() != front.len()) {
            return Err(DriverError::InvalidConfiguration(
                "render buffers must be non-empty and of equal length",
            ));
        }
        Ok(Renderer {
            front,
            back,
            band_lines,
            done: Done::new(),
        })
    }

    /// Allocates scratch buffers for bands of `band_lines` rows of `width` pixels.
    ///
    /// The buffers are leaked: a renderer lives for the whole program.
    pub fn new_heap(width: u16, band_lines: usize, double: bool) -> Result<Self, DriverError> {
        let len = width as usize * band_lines;
        let front = leak_buffer(len)?;
        let back = if double { Some(leak_buffer(len)?) } else { None };
        Self::new_static(band_lines, front, back)
    }

    pub fn band_lines(&self) -> usize {
        self.band_lines
    }

    /// Streams the inclusive region `(x0, y0)..=(x1, y1)` of the display.
    ///
    /// The compositor is asked for scene coordinates starting at `origin` and moving down one
    /// row per display row. The region must lie inside the display; otherwise nothing is
    /// drawn. Chip-select stays asserted for the whole region. With DMA the last band may
    /// still be in flight on return.
    #[allow(clippy::too_many_arguments)]
    pub fn render<B, D, C, S>(
        &mut self,
        display: &mut Display<B, D>,
        compositor: &C,
        cores: &mut S,
        (x0, y0): (u16, u16),
        (x1, y1): (u16, u16),
        origin: (i32, i32),
    ) where
        B: SpiRegisters + 'static,
        D: DelayNs,
        C: Compositor,
        S: CoreSplit,
    {
        if x0 > x1 || y0 > y1 || x1 >= display.width() || y1 >= display.height() {
            debug!("render region ({x0}, {y0})..=({x1}, {y1}) outside display, skipped");
            return;
        }

        let width = (x1 - x0 + 1) as usize;
        let band = self.band_lines.min(self.front.len() / width);
        if band == 0 {
            warn!("render buffer holds less than one row of {width} pixels");
            return;
        }
        let dma = display.has_dma() && self.back.is_some();

        display.set_active_window(x0, y0, x1, y1);
        display.link.hold_lines(true);
        display.link.select();
        display.link.data_mode();

        let (xc, mut yc) = origin;
        let mut remaining = (y1 - y0 + 1) as usize;
        let mut use_back = false;
        while remaining > 0 {
            let rows = remaining.min(band);
            let buffer: &mut [u16] = match (use_back, self.back.as_deref_mut()) {
                (true, Some(back)) => back,
                _ => &mut *self.front,
            };
            let buffer = &mut buffer[..rows * width];

            composite_band(&self.done, compositor, cores, xc, yc, width, rows, buffer);
            trace!("band at scene row {yc}: {rows} rows");

            if dma {
                // SAFETY: the buffer is not written again until two bands later. Starting
                // the next band's transfer waits for this one to drain, and the next render
                // call waits in `set_active_window` before compositing anything.
                unsafe { display.write_data_dma_unchecked(buffer) };
                use_back = !use_back;
            } else {
                display.write_data(buffer);
            }

            remaining -= rows;
            yc += rows as i32;
        }

        let link = &display.link;
        link.hold_lines(false);
        if !dma {
            link.deselect();
            return;
        }
        critical_section::with(|_| {
            // The done interrupt skips displays that are already deselected, so a transfer
            // that finished before it was serviced has its status cleared here.
            if !link.spi.is_busy() {
                link.spi.clear_interrupts();
                link.deselect();
            }
        });
    }
}

fn leak_buffer(len: usize) -> Result<&'static mut [u16], DriverError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| DriverError::OutOfMemory)?;
    buffer.resize(len, 0u16);
    Ok(Box::leak(buffer.into_boxed_slice()))
}

/// Fills one band, splitting its rows across cores when that is worth it.
#[allow(clippy::too_many_arguments)]
fn composite_band<C, S>(
    done: &Done,
    compositor: &C,
    cores: &mut S,
    xc: i32,
    yc: i32,
    width: usize,
    rows: usize,
    buffer: &mut [u16],
) where
    C: Compositor,
    S: CoreSplit,
{
    let x_end = xc + width as i32 - 1;
    if rows < 2 || !cores.parallel() {
        compositor.render_region(xc, yc, x_end, yc + rows as i32 - 1, buffer);
        return;
    }

    let lower_rows = rows / 2;
    let upper_rows = rows - lower_rows;
    let (upper, lower) = buffer.split_at_mut(upper_rows * width);
    let split_y = yc + upper_rows as i32;

    cores.split(
        || {
            compositor.render_region(xc, yc, x_end, split_y - 1, upper);
            done.give();
        },
        || {
            compositor.render_region(xc, split_y, x_end, split_y + lower_rows as i32 - 1, lower);
            done.give();
        },
    );
    done.take();
    done.take();
}
