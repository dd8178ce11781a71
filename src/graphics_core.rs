use embedded_graphics_core::{pixelcolor::Rgb565, prelude::*, primitives::Rectangle};
use embedded_hal::delay::DelayNs;

use crate::bus::SpiRegisters;
use crate::color;
use crate::display::Display;
use crate::transfer::Burst;

impl<B, D> DrawTarget for Display<B, D>
where
    B: SpiRegisters + 'static,
    D: DelayNs,
{
    type Color = Rgb565;
    // Drawing goes straight to the controller and the bus has no error path.
    type Error = core::convert::Infallible;

    /// Draws pixels one window at a time. Prefer the area based methods for anything
    /// larger than a few pixels.
    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels.into_iter() {
            let color16 = color::from_rgb565(color, self.byte_order);
            self.pixel16(coord.x.into(), coord.y.into(), color16);
        }
        Ok(())
    }

    /// Streams the visible part of `area` through one window.
    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let drawable_area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = drawable_area.bottom_right() else {
            return Ok(());
        };

        let area_width = area.size.width as usize;
        let clipped_width = drawable_area.size.width as usize;
        let skip_left = (drawable_area.top_left.x - area.top_left.x) as usize;
        let skip_top = (drawable_area.top_left.y - area.top_left.y) as usize;
        let skip_right = area_width - skip_left - clipped_width;

        let top_left = drawable_area.top_left;
        self.set_active_window(
            top_left.x as u16,
            top_left.y as u16,
            bottom_right.x as u16,
            bottom_right.y as u16,
        );
        self.link.select();
        self.link.data_mode();

        let order = self.byte_order;
        let mut colors = colors.into_iter().skip(skip_top * area_width);
        let mut burst = Burst::new(self.link.spi);
        for _ in 0..drawable_area.size.height {
            for color in colors.by_ref().skip(skip_left).take(clipped_width) {
                burst.push(color::from_rgb565(color, order));
            }
            for _ in colors.by_ref().take(skip_right) {}
        }
        burst.finish();
        self.release_cs();
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        if let Some(bottom_right) = area.bottom_right() {
            let color16 = color::from_rgb565(color, self.byte_order);
            self.fill_window16(
                area.top_left.x.into(),
                area.top_left.y.into(),
                bottom_right.x.into(),
                bottom_right.y.into(),
                color16,
            );
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill_solid(&self.bounding_box(), color)
    }
}

impl<B, D> OriginDimensions for Display<B, D>
where
    B: SpiRegisters + 'static,
    D: DelayNs,
{
    fn size(&self) -> Size {
        Size::new(self.width() as u32, self.height() as u32)
    }
}
