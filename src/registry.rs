use alloc::boxed::Box;
use alloc::sync::Arc;
use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};
use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::bus::{BusLink, SpiConnection, SpiRegisters};
use crate::display::{Backlight, Display, Geometry, Power};
use crate::dma::DescriptorChain;
use crate::{CommandSet, DriverError, Orientation, PanelConfig};

struct Slot<B: 'static> {
    link: Arc<BusLink<B>>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Fixed capacity arena holding a doubly linked list of displays in insertion order.
pub(crate) struct Arena<B: 'static, const N: usize> {
    slots: [Option<Slot<B>>; N],
    head: Option<usize>,
    tail: Option<usize>,
}

impl<B: 'static, const N: usize> Arena<B, N> {
    const fn new() -> Self {
        Arena {
            slots: [const { None }; N],
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.iter().count()
    }

    /// Appends `link` at the tail and returns its slot and its position in the list.
    fn push(&mut self, link: Arc<BusLink<B>>) -> Result<(usize, usize), DriverError> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(DriverError::RegistryFull)?;
        let position = self.len();

        self.slots[index] = Some(Slot {
            link,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => {
                if let Some(slot) = self.slots[tail].as_mut() {
                    slot.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        Ok((index, position))
    }

    /// Unlinks slot `index` if it still holds `link`.
    fn remove(&mut self, index: usize, link: &Arc<BusLink<B>>) -> bool {
        let Some(slot) = self.slots.get(index).and_then(Option::as_ref) else {
            return false;
        };
        if !Arc::ptr_eq(&slot.link, link) {
            return false;
        }
        let (prev, next) = (slot.prev, slot.next);

        match prev {
            Some(prev) => {
                if let Some(slot) = self.slots[prev].as_mut() {
                    slot.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next) => {
                if let Some(slot) = self.slots[next].as_mut() {
                    slot.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        self.slots[index] = None;
        true
    }

    /// Walks the list from head to tail.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &BusLink<B>> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let slot = self.slots.get(cursor?)?.as_ref()?;
            cursor = slot.next;
            Some(&*slot.link)
        })
    }
}

/// The list a [`Display`] unlinks itself from when it is dropped.
pub(crate) trait DisplayList<B: 'static>: Sync {
    fn unlink(&self, cs: CriticalSection<'_>, slot: usize, link: &Arc<BusLink<B>>) -> bool;
}

impl<B, const N: usize> DisplayList<B> for Registry<B, N>
where
    B: SpiRegisters + 'static,
{
    fn unlink(&self, cs: CriticalSection<'_>, slot: usize, link: &Arc<BusLink<B>>) -> bool {
        self.arena.borrow_ref_mut(cs).remove(slot, link)
    }
}

/// Owns the list of displays and hands out [`Display`] handles.
///
/// Put it in a `static` so the SPI interrupt handler can reach it through
/// [`transaction_done`](Self::transaction_done). The list is only touched inside critical
/// sections.
pub struct Registry<B: 'static, const N: usize> {
    pub(crate) arena: Mutex<RefCell<Arena<B, N>>>,
}

impl<B, const N: usize> Default for Registry<B, N>
where
    B: SpiRegisters + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<B, const N: usize> Registry<B, N>
where
    B: SpiRegisters + 'static,
{
    pub const fn new() -> Self {
        Registry {
            arena: Mutex::new(RefCell::new(Arena::new())),
        }
    }

    /// Creates a display and appends it to the list.
    ///
    /// The panel's smaller side becomes the portrait width. The display starts in portrait
    /// with the panel offsets applied and nothing is sent to the hardware until
    /// [`Display::init`].
    ///
    /// # Errors
    ///
    /// - [`DriverError::InvalidConfiguration`] if the panel does not fit the controller.
    /// - [`DriverError::OutOfMemory`] if the DMA descriptor chain cannot be allocated.
    /// - [`DriverError::RegistryFull`] if all `N` slots are taken.
    pub fn add<C, D>(
        &'static self,
        panel: PanelConfig,
        commands: C,
        connection: SpiConnection<B>,
        backlight: Backlight,
        delay: D,
    ) -> Result<Display<B, D>, DriverError>
    where
        C: CommandSet + 'static,
        D: DelayNs,
    {
        let short = panel.resolution1.min(panel.resolution2);
        let long = panel.resolution1.max(panel.resolution2);
        if short == 0 {
            return Err(DriverError::InvalidConfiguration(
                "panel resolution must be non-zero",
            ));
        }
        if panel.controller.width < short || panel.controller.height < long {
            return Err(DriverError::InvalidConfiguration(
                "panel resolution exceeds controller bounds",
            ));
        }

        let chain = if connection.dma {
            DescriptorChain::for_frame(short, long)?
        } else {
            DescriptorChain::empty()
        };

        let link = BusLink::new(connection);
        let (slot, position) = critical_section::with(|cs| {
            self.arena.borrow_ref_mut(cs).push(Arc::clone(&link))
        })?;
        let number = u8::try_from(position).unwrap_or(u8::MAX);

        debug!(
            "display {number}: {short}x{long} panel, {} descriptors",
            chain.capacity()
        );

        Ok(Display {
            registry: self,
            slot,
            number,
            link,
            commands: Box::new(commands),
            delay,
            controller: panel.controller,
            w_offs: panel.w_offs,
            h_offs: panel.h_offs,
            geometry: Geometry::oriented(
                short,
                long,
                panel.controller,
                panel.w_offs,
                panel.h_offs,
                Orientation::Portrait,
            ),
            orientation: Orientation::Portrait,
            byte_order: panel.byte_order,
            backlight: Backlight {
                percent: backlight.percent.min(100),
                ..backlight
            },
            power: Power::Off,
            cursor: (0, 0),
            fill_word: Box::new(0),
            chain,
        })
    }

    /// Waits for the display's last transfer to finish, unlinks it and frees it.
    ///
    /// Dropping the handle does the same. A display added to another registry is still
    /// removed from that registry, with a warning.
    pub fn delete<D: DelayNs>(&self, display: Display<B, D>) {
        let registry: *const dyn DisplayList<B> = display.registry;
        if !core::ptr::addr_eq(registry, self as *const Self) {
            warn!("display {} belongs to another registry", display.number);
        }
        drop(display);
    }

    /// Number of registered displays.
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.arena.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
