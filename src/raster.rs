//! Rasterization of points, lines, rectangles, triangles and circles.
//!
//! Coordinates are signed so shapes may extend past the display edges. Anything outside is
//! clipped, and a shape that is entirely outside sends nothing to the bus. Public methods
//! take `0xRRGGBB` colors; the internal helpers work on the display's 16-bit pixel value
//! and on `i64` coordinates, so any `i32` input is safe to add and subtract.

use embedded_hal::delay::DelayNs;

use crate::bus::SpiRegisters;
use crate::display::Display;

/// Where an edge crosses a pixel row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Crossing {
    None,
    /// The edge crosses the row at one column.
    Point(i32),
    /// The edge lies on the row.
    Span(i32, i32),
}

/// Intersects the edge `(x1, y1)-(x2, y2)` with row `y`.
pub(crate) fn row_crossing((x1, y1): (i32, i32), (x2, y2): (i32, i32), y: i32) -> Crossing {
    if y < y1.min(y2) || y > y1.max(y2) {
        return Crossing::None;
    }
    if y1 == y2 {
        return Crossing::Span(x1.min(x2), x1.max(x2));
    }
    if x1 == x2 {
        return Crossing::Point(x1);
    }
    let dx = x2 as i128 - x1 as i128;
    let x = dx * (y as i128 - y1 as i128) / (y2 as i128 - y1 as i128) + x1 as i128;
    if x < x1.min(x2) as i128 || x > x1.max(x2) as i128 {
        Crossing::None
    } else {
        Crossing::Point(x as i32)
    }
}

impl<B, D> Display<B, D>
where
    B: SpiRegisters + 'static,
    D: DelayNs,
{
    /// Fills the inclusive rectangle `(x1, y1)..=(x2, y2)` with a solid color.
    ///
    /// Corners may be given in any order. The rectangle is clipped to the display and
    /// nothing is sent when it lies completely outside.
    pub fn fill_window(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: u32) {
        let color16 = self.color_24b(color);
        self.fill_window16(x1.into(), y1.into(), x2.into(), y2.into(), color16);
    }

    /// Fills the whole display.
    pub fn fill(&mut self, color: u32) {
        let (w, h) = (self.width() as i32, self.height() as i32);
        self.fill_window(0, 0, w - 1, h - 1, color);
    }

    pub fn draw_pixel(&mut self, x: i32, y: i32, color: u32) {
        let color16 = self.color_24b(color);
        self.pixel16(x.into(), y.into(), color16);
    }

    /// Draws a line with Bresenham's algorithm. Horizontal and vertical lines are sent as a
    /// single window fill.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        let color16 = self.color_24b(color);
        self.line16(x0.into(), y0.into(), x1.into(), y1.into(), color16);
    }

    pub fn draw_rectangle(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: u32) {
        let color16 = self.color_24b(color);
        let (x1, y1, x2, y2) = (x1.into(), y1.into(), x2.into(), y2.into());
        self.line16(x1, y1, x2, y1, color16);
        self.line16(x1, y2, x2, y2, color16);
        self.line16(x1, y1, x1, y2, color16);
        self.line16(x2, y1, x2, y2, color16);
    }

    /// Same as [`fill_window`](Self::fill_window).
    pub fn fill_rectangle(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: u32) {
        self.fill_window(x1, y1, x2, y2, color);
    }

    pub fn draw_triangle(
        &mut self,
        (x1, y1): (i32, i32),
        (x2, y2): (i32, i32),
        (x3, y3): (i32, i32),
        color: u32,
    ) {
        let color16 = self.color_24b(color);
        let (x1, y1, x2, y2, x3, y3) = (
            x1.into(),
            y1.into(),
            x2.into(),
            y2.into(),
            x3.into(),
            y3.into(),
        );
        self.line16(x1, y1, x2, y2, color16);
        self.line16(x2, y2, x3, y3, color16);
        self.line16(x3, y3, x1, y1, color16);
    }

    /// Fills a triangle row by row between its leftmost and rightmost edge crossings.
    ///
    /// Zero-area triangles draw nothing.
    pub fn draw_filled_triangle(
        &mut self,
        a: (i32, i32),
        b: (i32, i32),
        c: (i32, i32),
        color: u32,
    ) {
        let mut vertices = [a, b, c];
        vertices.sort_unstable_by_key(|&(_, y)| y);
        let [p1, p2, p3] = vertices;

        let wide = |v: i32| v as i128;
        let area2 = (wide(p2.0) - wide(p1.0)) * (wide(p3.1) - wide(p1.1))
            - (wide(p3.0) - wide(p1.0)) * (wide(p2.1) - wide(p1.1));
        if area2 == 0 {
            return;
        }

        let (w, h) = (self.width() as i32, self.height() as i32);
        let x_min = p1.0.min(p2.0).min(p3.0);
        let x_max = p1.0.max(p2.0).max(p3.0);
        if p1.1 > h - 1 || p3.1 < 0 || x_max < 0 || x_min > w - 1 {
            return;
        }

        let color16 = self.color_24b(color);
        let edges = [(p1, p2), (p2, p3), (p3, p1)];
        for y in p1.1.max(0)..=p3.1.min(h - 1) {
            let mut crossings = 0;
            let mut span = (i32::MAX, i32::MIN);
            for &(from, to) in &edges {
                let (left, right) = match row_crossing(from, to, y) {
                    Crossing::None => continue,
                    Crossing::Point(x) => (x, x),
                    Crossing::Span(left, right) => (left, right),
                };
                crossings += 1;
                span = (span.0.min(left), span.1.max(right));
            }
            if crossings >= 2 {
                let y = y.into();
                self.line16(span.0.into(), y, span.1.into(), y, color16);
            }
        }
    }

    /// Draws a circle outline with the midpoint algorithm.
    pub fn draw_circle(&mut self, x0: i32, y0: i32, r: i32, color: u32) {
        let (x0, y0, r) = (i64::from(x0), i64::from(y0), i64::from(r));
        if !self.circle_visible(x0, y0, r) {
            return;
        }
        let color16 = self.color_24b(color);
        self.pixel16(x0, y0 + r, color16);
        self.pixel16(x0, y0 - r, color16);
        self.pixel16(x0 + r, y0, color16);
        self.pixel16(x0 - r, y0, color16);

        for (x, y) in Midpoint::new(r) {
            self.pixel16(x0 + x, y0 + y, color16);
            self.pixel16(x0 - x, y0 + y, color16);
            self.pixel16(x0 + x, y0 - y, color16);
            self.pixel16(x0 - x, y0 - y, color16);
            self.pixel16(x0 + y, y0 + x, color16);
            self.pixel16(x0 - y, y0 + x, color16);
            self.pixel16(x0 + y, y0 - x, color16);
            self.pixel16(x0 - y, y0 - x, color16);
        }
    }

    /// Draws a filled circle as horizontal spans.
    pub fn draw_filled_circle(&mut self, x0: i32, y0: i32, r: i32, color: u32) {
        let (x0, y0, r) = (i64::from(x0), i64::from(y0), i64::from(r));
        if !self.circle_visible(x0, y0, r) {
            return;
        }
        let color16 = self.color_24b(color);
        self.line16(x0 - r, y0, x0 + r, y0, color16);

        for (x, y) in Midpoint::new(r) {
            self.line16(x0 - x, y0 + y, x0 + x, y0 + y, color16);
            self.line16(x0 - x, y0 - y, x0 + x, y0 - y, color16);
            self.line16(x0 - y, y0 + x, x0 + y, y0 + x, color16);
            self.line16(x0 - y, y0 - x, x0 + y, y0 - x, color16);
        }
    }

    /// True if the bounding square of the circle touches the display.
    fn circle_visible(&self, x0: i64, y0: i64, r: i64) -> bool {
        let (w, h) = (i64::from(self.width()), i64::from(self.height()));
        let r = r.abs();
        x0 + r >= 0 && y0 + r >= 0 && x0 - r < w && y0 - r < h
    }

    pub(crate) fn fill_window16(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color16: u16) {
        let (w, h) = (i64::from(self.width()), i64::from(self.height()));
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        if x1 > w - 1 || y1 > h - 1 || x2 < 0 || y2 < 0 {
            return;
        }
        let (x1, y1) = (x1.max(0), y1.max(0));
        let (x2, y2) = (x2.min(w - 1), y2.min(h - 1));

        let pixels = (x2 - x1 + 1) as usize * (y2 - y1 + 1) as usize;
        self.set_active_window(x1 as u16, y1 as u16, x2 as u16, y2 as u16);
        self.stream_fill(color16, pixels);
    }

    pub(crate) fn pixel16(&mut self, x: i64, y: i64, color16: u16) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        let (x, y) = (x as u16, y as u16);
        self.set_active_window(x, y, x, y);
        self.stream_pixels(&[color16], false);
    }

    /// Bresenham along the major axis, restricted to the columns that can reach the screen.
    pub(crate) fn line16(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color16: u16) {
        if x0 == x1 || y0 == y1 {
            self.fill_window16(x0, y0, x1, y1, color16);
            return;
        }
        let (w, h) = (i64::from(self.width()), i64::from(self.height()));
        if x0.max(x1) < 0 || y0.max(y1) < 0 || x0.min(x1) >= w || y0.min(y1) >= h {
            return;
        }

        let steep = (y1 - y0).abs() > (x1 - x0).abs();
        let (mut x0, mut y0, mut x1, mut y1) = if steep {
            (y0, x0, y1, x1)
        } else {
            (x0, y0, x1, y1)
        };
        if x0 > x1 {
            core::mem::swap(&mut x0, &mut x1);
            core::mem::swap(&mut y0, &mut y1);
        }

        let dx = x1 - x0;
        let dy = (y1 - y0).abs();
        let y_step = if y0 < y1 { 1 } else { -1 };
        let first = x0.max(0);
        let last = x1.min(if steep { h } else { w } - 1);

        // Error term and minor coordinate after stepping over the off-screen columns.
        let skipped = (first - x0) as i128;
        let half = (dx / 2) as i128;
        let steps = (skipped * dy as i128 - half + dx as i128 - 1) / dx as i128;
        let mut err = (half - skipped * dy as i128 + steps * dx as i128) as i64;
        let mut y = y0 + y_step * steps as i64;

        for x in first..=last {
            if steep {
                self.pixel16(y, x, color16);
            } else {
                self.pixel16(x, y, color16);
            }
            err -= dy;
            if err < 0 {
                y += y_step;
                err += dx;
            }
        }
    }
}

/// Octant points of a midpoint circle, excluding the four axis points.
struct Midpoint {
    f: i64,
    dd_f_x: i64,
    dd_f_y: i64,
    x: i64,
    y: i64,
}

impl Midpoint {
    fn new(r: i64) -> Self {
        Midpoint {
            f: 1 - r,
            dd_f_x: 1,
            dd_f_y: -2 * r,
            x: 0,
            y: r,
        }
    }
}

impl Iterator for Midpoint {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.x >= self.y {
            return None;
        }
        if self.f >= 0 {
            self.y -= 1;
            self.dd_f_y += 2;
            self.f += self.dd_f_y;
        }
        self.x += 1;
        self.dd_f_x += 2;
        self.f += self.dd_f_x;
        Some((self.x, self.y))
    }
}
