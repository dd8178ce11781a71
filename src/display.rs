use alloc::boxed::Box;
use alloc::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::bus::{BusLink, Line, SpiRegisters};
use crate::color::{self, ByteOrder};
use crate::commands;
use crate::dma::DescriptorChain;
use crate::registry::DisplayList;
use crate::{CommandSet, DisplaySize, Orientation};

/// Backlight wiring and initial brightness.
#[derive(Clone, Copy)]
pub struct Backlight {
    pub pin: Option<Line>,
    /// Brightness in percent, clamped to 100. Zero switches the backlight off.
    pub percent: u8,
}

impl Backlight {
    pub const fn new(pin: Option<Line>, percent: u8) -> Self {
        Backlight { pin, percent }
    }
}

/// What a display is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    /// Added but [`Display::init`] has not run yet.
    Uninitialized,
    /// Idle and awake.
    Ready,
    /// Idle and in sleep mode.
    Sleeping,
    /// A transfer is in flight on the display's SPI peripheral.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Power {
    Off,
    Awake,
    Asleep,
}

/// Logical geometry for one orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) x_offs: i32,
    pub(crate) y_offs: i32,
}

impl Geometry {
    /// Places a `short` x `long` panel inside `controller` RAM for `orientation`, given the
    /// panel's fixed portrait offsets.
    pub(crate) fn oriented(
        short: u16,
        long: u16,
        controller: DisplaySize,
        w_offs: i32,
        h_offs: i32,
        orientation: Orientation,
    ) -> Self {
        let (width, height, cw, ch) = if orientation.is_landscape() {
            (long, short, controller.height, controller.width)
        } else {
            (short, long, controller.width, controller.height)
        };
        let (w, h, cw, ch) = (width as i32, height as i32, cw as i32, ch as i32);

        let (x_offs, y_offs) = match orientation {
            Orientation::Portrait => (w_offs, h_offs),
            Orientation::PortraitMirror => (cw - w - w_offs, ch - h - h_offs),
            Orientation::Landscape => (h_offs, ch - h - w_offs),
            Orientation::LandscapeMirror => (cw - w - h_offs, w_offs),
        };

        Geometry {
            width,
            height,
            x_offs,
            y_offs,
        }
    }
}

/// A display registered in a [`Registry`](crate::Registry).
///
/// Every drawing call is synchronous with respect to the command path. Pixel data sent
/// through DMA may still be in flight when a call returns; the next call that touches the
/// bus waits for it, and the SPI interrupt releases chip-select once it is done.
///
/// Dropping the handle waits for the bus to go idle, releases chip-select and removes the
/// display from its registry.
pub struct Display<B: SpiRegisters + 'static, D: DelayNs> {
    pub(crate) registry: &'static dyn DisplayList<B>,
    pub(crate) slot: usize,
    pub(crate) number: u8,
    pub(crate) link: Arc<BusLink<B>>,
    pub(crate) commands: Box<dyn CommandSet>,
    pub(crate) delay: D,
    pub(crate) controller: DisplaySize,
    pub(crate) w_offs: i32,
    pub(crate) h_offs: i32,
    pub(crate) geometry: Geometry,
    pub(crate) orientation: Orientation,
    pub(crate) byte_order: ByteOrder,
    pub(crate) backlight: Backlight,
    pub(crate) power: Power,
    pub(crate) cursor: (u16, u16),
    /// Source word of the self-looping fill descriptor. Boxed so its address survives moves
    /// of the handle while a fill is in flight.
    pub(crate) fill_word: Box<u32>,
    pub(crate) chain: DescriptorChain,
}

impl<B, D> Display<B, D>
where
    B: SpiRegisters + 'static,
    D: DelayNs,
{
    /// Logical width in the current orientation.
    pub fn width(&self) -> u16 {
        self.geometry.width
    }

    /// Logical height in the current orientation.
    pub fn height(&self) -> u16 {
        self.geometry.height
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Column and row offset currently added to every window coordinate.
    pub fn offsets(&self) -> (i32, i32) {
        (self.geometry.x_offs, self.geometry.y_offs)
    }

    /// Controller RAM size as seen in the current orientation.
    pub fn controller_size(&self) -> DisplaySize {
        if self.orientation.is_landscape() {
            DisplaySize::new(self.controller.height, self.controller.width)
        } else {
            self.controller
        }
    }

    /// Position of this display in the registry at the time it was added, starting at 0.
    pub fn display_number(&self) -> u8 {
        self.number
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn has_dma(&self) -> bool {
        self.link.dma
    }

    /// Backlight brightness in percent.
    pub fn backlight(&self) -> u8 {
        self.backlight.percent
    }

    pub fn state(&self) -> DisplayState {
        if self.link.spi.is_busy() {
            return DisplayState::Busy;
        }
        match self.power {
            Power::Off => DisplayState::Uninitialized,
            Power::Awake => DisplayState::Ready,
            Power::Asleep => DisplayState::Sleeping,
        }
    }

    /// Blocks until the SPI peripheral is idle.
    pub fn wait_idle(&self) {
        self.link.spi.wait_idle();
    }

    /// Gives access to the delay provider owned by this display.
    pub fn delay(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Pulses the reset line: low for 10 ms, then high for 10 ms.
    ///
    /// Does nothing when no reset line is wired.
    pub fn hardware_reset(&mut self) {
        let Some(reset) = self.link.reset else {
            return;
        };
        reset.set_low();
        self.delay.delay_ms(10);
        reset.set_high();
        self.delay.delay_ms(10);
    }

    /// Runs the full bring-up: hardware reset, controller init sequence, the current
    /// orientation and the configured backlight level.
    pub fn init(&mut self) {
        debug!("display {}: init", self.number);
        self.hardware_reset();
        let stream = self.commands.init();
        commands::run(&self.link, &mut self.delay, stream);
        self.set_orientation(self.orientation);
        self.set_backlight(self.backlight.percent);
        self.power = Power::Awake;
    }

    /// Sets the backlight brightness. Values above 100 are clamped.
    ///
    /// Without PWM the pin is simply on for any non-zero value.
    pub fn set_backlight(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.backlight.percent = percent;
        if let Some(pin) = self.backlight.pin {
            if percent > 0 {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
    }

    /// Switches the backlight off and puts the controller to sleep.
    pub fn sleep_in(&mut self) {
        debug!("display {}: sleep in", self.number);
        if let Some(pin) = self.backlight.pin {
            pin.set_low();
        }
        if let Some(stream) = self.commands.sleep_in() {
            commands::run(&self.link, &mut self.delay, stream);
        }
        self.power = Power::Asleep;
    }

    /// Wakes the controller and restores the backlight level.
    pub fn sleep_out(&mut self) {
        debug!("display {}: sleep out", self.number);
        if let Some(stream) = self.commands.sleep_out() {
            commands::run(&self.link, &mut self.delay, stream);
        }
        self.set_backlight(self.backlight.percent);
        self.power = Power::Awake;
    }

    /// Switches to `orientation`, updating the logical size and the window offsets.
    ///
    /// Leaves everything untouched when the controller has no orientation command.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        let short = self.geometry.width.min(self.geometry.height);
        let long = self.geometry.width.max(self.geometry.height);
        let geometry = Geometry::oriented(
            short,
            long,
            self.controller,
            self.w_offs,
            self.h_offs,
            orientation,
        );

        let Some(stream) = self.commands.set_orientation(orientation) else {
            return;
        };
        self.geometry = geometry;
        self.orientation = orientation;
        debug!(
            "display {}: {:?}, {}x{}, offsets ({}, {})",
            self.number,
            orientation,
            geometry.width,
            geometry.height,
            geometry.x_offs,
            geometry.y_offs
        );
        commands::run(&self.link, &mut self.delay, stream);
    }

    /// Sets the controller window to the inclusive logical rectangle `(x0, y0)..=(x1, y1)`.
    ///
    /// Coordinates are shifted by the current offsets and not validated.
    pub fn set_active_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) {
        let Geometry { x_offs, y_offs, .. } = self.geometry;
        let stream = self.commands.set_window(
            shift(x0, x_offs),
            shift(y0, y_offs),
            shift(x1, x_offs),
            shift(y1, y_offs),
        );
        commands::run(&self.link, &mut self.delay, stream);
    }

    /// Packs 8-bit channels into this display's 16-bit pixel format.
    pub fn color(&self, r: u8, g: u8, b: u8) -> u16 {
        color::rgb565(r, g, b, self.byte_order)
    }

    /// Converts a `0xRRGGBB` color into this display's 16-bit pixel format.
    pub fn color_24b(&self, rgb: u32) -> u16 {
        color::rgb888_to_565(rgb, self.byte_order)
    }
}

impl<B, D> Drop for Display<B, D>
where
    B: SpiRegisters + 'static,
    D: DelayNs,
{
    fn drop(&mut self) {
        // The descriptor chain and the fill word are freed right after this.
        self.wait_idle();
        self.link.hold_lines(false);
        let unlinked = critical_section::with(|cs| {
            if self.link.is_selected() {
                self.link.spi.clear_interrupts();
                self.link.deselect();
            }
            self.registry.unlink(cs, self.slot, &self.link)
        });
        if unlinked {
            debug!("display {}: deleted", self.number);
        }
    }
}

fn shift(coord: u16, offset: i32) -> u16 {
    (coord as i32 + offset).clamp(0, u16::MAX as i32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ControlLine;
    use crate::sim::{self, Transfer};
    use std::vec;

    const CONTROLLER: DisplaySize = DisplaySize::new(240, 320);

    #[test]
    fn landscape_of_square_panel_in_tall_controller() {
        let geometry = Geometry::oriented(240, 240, CONTROLLER, 0, 0, Orientation::Landscape);
        assert_eq!(
            geometry,
            Geometry {
                width: 240,
                height: 240,
                x_offs: 0,
                y_offs: 0,
            }
        );

        let geometry = Geometry::oriented(240, 240, CONTROLLER, 0, 0, Orientation::PortraitMirror);
        assert_eq!((geometry.x_offs, geometry.y_offs), (0, 80));

        let geometry =
            Geometry::oriented(240, 240, CONTROLLER, 0, 0, Orientation::LandscapeMirror);
        assert_eq!((geometry.x_offs, geometry.y_offs), (80, 0));
    }

    #[test]
    fn offsets_follow_orientation() {
        let portrait = Geometry::oriented(135, 240, CONTROLLER, 52, 40, Orientation::Portrait);
        assert_eq!((portrait.width, portrait.height), (135, 240));
        assert_eq!((portrait.x_offs, portrait.y_offs), (52, 40));

        let landscape = Geometry::oriented(135, 240, CONTROLLER, 52, 40, Orientation::Landscape);
        assert_eq!((landscape.width, landscape.height), (240, 135));
        assert_eq!((landscape.x_offs, landscape.y_offs), (40, 240 - 135 - 52));
    }

    #[test]
    fn landscape_scenario_swaps_dimensions() {
        let mut rig = sim::rig(240, 240, false);
        rig.display.set_orientation(Orientation::Landscape);
        assert_eq!(rig.display.width(), 240);
        assert_eq!(rig.display.height(), 240);
        assert_eq!(rig.display.controller_size(), DisplaySize::new(320, 240));
        assert_eq!(rig.display.offsets(), (0, 0));

        let mut rig = sim::rig(240, 320, false);
        rig.display.set_orientation(Orientation::Landscape);
        assert_eq!((rig.display.width(), rig.display.height()), (320, 240));
    }

    #[test]
    fn orientation_round_trip_restores_geometry() {
        let mut rig = sim::rig_with(sim::panel(135, 240).with_offsets(52, 40), false);
        let before = (rig.display.width(), rig.display.height(), rig.display.offsets());
        for orientation in [
            Orientation::Landscape,
            Orientation::PortraitMirror,
            Orientation::LandscapeMirror,
            Orientation::Portrait,
        ] {
            rig.display.set_orientation(orientation);
        }
        assert_eq!(
            (rig.display.width(), rig.display.height(), rig.display.offsets()),
            before
        );
        assert_eq!(rig.display.orientation(), Orientation::Portrait);
    }

    #[test]
    fn missing_orientation_command_changes_nothing() {
        let mut rig = sim::rig(240, 320, false);
        rig.commands.disable_orientation();
        rig.display.set_orientation(Orientation::Landscape);
        assert_eq!(rig.display.orientation(), Orientation::Portrait);
        assert_eq!((rig.display.width(), rig.display.height()), (240, 320));
        assert!(rig.spi.transfers().is_empty());
    }

    #[test]
    fn window_includes_offsets() {
        let mut rig = sim::rig_with(sim::panel(135, 240).with_offsets(52, 40), false);
        rig.display.set_active_window(0, 0, 9, 19);
        assert_eq!(
            rig.spi.transfers(),
            vec![
                Transfer::command(0x2A),
                Transfer::data(&[0, 52, 0, 61]),
                Transfer::command(0x2B),
                Transfer::data(&[0, 40, 0, 59]),
                Transfer::command(0x2C),
            ]
        );
    }

    #[test]
    fn backlight_is_clamped_and_switched() {
        let mut rig = sim::rig(240, 240, false);
        rig.display.set_backlight(150);
        assert_eq!(rig.display.backlight(), 100);
        assert!(rig.backlight.is_set_high());

        rig.display.set_backlight(0);
        assert_eq!(rig.display.backlight(), 0);
        assert!(!rig.backlight.is_set_high());
    }

    #[test]
    fn init_resets_then_configures() {
        let mut rig = sim::rig(240, 240, false);
        assert_eq!(rig.display.state(), DisplayState::Uninitialized);

        rig.display.init();

        assert_eq!(rig.reset.history(), vec![false, true]);
        assert_eq!(rig.ticks.millis(), 10 + 10 + sim::INIT_PAUSE_MS as u64);
        let transfers = rig.spi.transfers();
        assert_eq!(transfers[0], Transfer::command(0x01));
        assert!(transfers.contains(&Transfer::command(0x36)));
        assert!(rig.backlight.is_set_high());
        assert_eq!(rig.display.state(), DisplayState::Ready);
    }

    #[test]
    fn sleep_turns_backlight_off_and_back_on() {
        let mut rig = sim::rig(240, 240, false);
        rig.display.init();
        rig.display.set_backlight(40);

        rig.display.sleep_in();
        assert!(!rig.backlight.is_set_high());
        assert_eq!(rig.display.state(), DisplayState::Sleeping);
        assert_eq!(rig.display.backlight(), 40);

        rig.display.sleep_out();
        assert!(rig.backlight.is_set_high());
        assert_eq!(rig.display.state(), DisplayState::Ready);
    }

    #[test]
    fn busy_bus_reports_busy() {
        let rig = sim::rig(240, 240, false);
        rig.spi.set_busy(true);
        assert_eq!(rig.display.state(), DisplayState::Busy);
        rig.spi.set_busy(false);
        assert_eq!(rig.display.state(), DisplayState::Uninitialized);
    }

    #[test]
    fn colors_use_display_byte_order() {
        let rig = sim::rig(240, 240, false);
        assert_eq!(rig.display.color(0xFF, 0, 0), 0x00F8);
        assert_eq!(rig.display.color_24b(0x0000FF), 0x1F00);
    }
}
