//! Desktop Background
//!
//! The background is the lowest surface of the desktop. It is never stored;
//! every pixel is a deterministic function of its position and the total
//! desktop area, so any part of it can be repainted on demand.

use crate::config::{GRID_CELL, GRID_EDGE, STRIP_ENTRIES};
use crate::format::blend_rgb;
use crate::framebuffer::{FramebufferRegistry, ScreenTarget};
use crate::rect::Rect;
use crate::scene::SceneGraph;
use crate::span::for_each_uncovered;

/// Background pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundStyle {
    /// Vertical gradient across the full desktop height
    #[default]
    Strip,
    /// Checkerboard with darkened left and right edges
    Grid,
    /// Flat colour
    Solid,
}

/// Background pattern generator.
#[derive(Debug, Clone)]
pub struct Background {
    style: BackgroundStyle,
    /// Main colour (`0xRRGGBB`)
    colour: u32,
    /// Alternate grid colour (`0xRRGGBB`)
    colour2: u32,
    /// Gradient samples, top to bottom
    strip: [u32; STRIP_ENTRIES],
}

impl Background {
    pub fn new(
        style: BackgroundStyle,
        colour: u32,
        colour2: u32,
        strip_top: u32,
        strip_bottom: u32,
    ) -> Self {
        let mut strip = [0u32; STRIP_ENTRIES];
        let last = (STRIP_ENTRIES - 1) as u32;
        for (i, entry) in strip.iter_mut().enumerate() {
            *entry = blend_rgb(strip_top, strip_bottom, (i as u32 * 255 / last) as u8);
        }

        Self {
            style,
            colour: colour & 0xffffff,
            colour2: colour2 & 0xffffff,
            strip,
        }
    }

    #[inline]
    pub fn style(&self) -> BackgroundStyle {
        self.style
    }

    #[inline]
    pub fn colour(&self) -> u32 {
        self.colour
    }

    /// Returns `true` if the colour changed.
    pub fn set_colour(&mut self, colour: u32) -> bool {
        let colour = colour & 0xffffff;
        if self.colour == colour {
            return false;
        }
        self.colour = colour;
        true
    }

    /// Returns `true` if the style changed.
    pub fn set_style(&mut self, style: BackgroundStyle) -> bool {
        if self.style == style {
            return false;
        }
        self.style = style;
        true
    }

    /// Background colour (`0xRRGGBB`) at desktop position `(x, y)`.
    pub fn sample(&self, x: i32, y: i32, total: Rect) -> u32 {
        match self.style {
            BackgroundStyle::Solid => self.colour,
            BackgroundStyle::Grid => self.sample_grid(x, y, total),
            BackgroundStyle::Strip => self.sample_strip(y, total),
        }
    }

    fn sample_grid(&self, x: i32, y: i32, total: Rect) -> u32 {
        let cell = (x.div_euclid(GRID_CELL) + y.div_euclid(GRID_CELL)).rem_euclid(2);
        let colour = if cell == 1 { self.colour } else { self.colour2 };

        let fade = if x < GRID_EDGE {
            GRID_EDGE - x
        } else if x >= total.x2 - GRID_EDGE {
            GRID_EDGE - (total.x2 - x)
        } else {
            return colour;
        };

        let darken = |shift: u32| {
            let channel = (colour >> shift & 0xff) as i32;
            ((channel - fade / 5).max(0) as u32) << shift
        };
        darken(16) | darken(8) | darken(0)
    }

    fn sample_strip(&self, y: i32, total: Rect) -> u32 {
        let height = total.height().max(1) as u32;
        let entries = STRIP_ENTRIES as u32;
        let y = (y - total.y1).clamp(0, height as i32 - 1) as u32;

        let pos1 = (y * entries / height).min(entries - 1);
        let pos2 = (pos1 + 1).min(entries - 1);
        let y1 = pos1 * height / entries;
        let y2 = pos2 * height / entries;

        let sample1 = self.strip[pos1 as usize];
        if y2 <= y1 {
            return sample1;
        }

        let sample2 = self.strip[pos2 as usize];
        let phase = (255 * (y - y1) / (y2 - y1)).min(255) as u8;
        blend_rgb(sample1, sample2, phase)
    }

    /// Paint desktop row `y` from `x1` to `x2`.
    pub(crate) fn fill_span(
        &self,
        target: &mut ScreenTarget<'_>,
        x1: i32,
        x2: i32,
        y: i32,
        total: Rect,
    ) {
        let len = (x2 - x1) as usize;

        if self.style != BackgroundStyle::Grid {
            target.fill_span(x1, y, len, 0xff00_0000 | self.sample(x1, y, total));
            return;
        }

        let (format, order) = (target.format(), target.order());
        let bpp = format.bytes_per_pixel();
        if let Some(span) = target.span_mut(x1, y, len) {
            for (x, pixel) in (x1..).zip(span.chunks_exact_mut(bpp)) {
                format.encode(order, 0xff00_0000 | self.sample(x, y, total), pixel);
            }
        }
    }
}

/// Fill every pixel of `rect` that no visible display covers. Returns the
/// number of pixels written.
pub(crate) fn paint_background_area(
    scene: &SceneGraph,
    framebuffers: &mut FramebufferRegistry,
    background: &Background,
    rect: Rect,
) -> u64 {
    let total = framebuffers.total_area();
    let mut written = 0u64;

    for mut target in framebuffers.targets() {
        let area = rect.intersect(&target.area());
        for y in area.y1..area.y2 {
            for_each_uncovered(
                area.x1,
                area.x2,
                || scene.iter().filter_map(move |d| d.visible_row_extent(y)),
                |x1, x2| {
                    background.fill_span(&mut target, x1, x2, y, total);
                    written += (x2 - x1) as u64;
                },
            );
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTAL: Rect = Rect::new(0, 0, 640, 480);

    #[test]
    fn test_solid_background() {
        let bg = Background::new(BackgroundStyle::Solid, 0xff123456, 0, 0, 0);

        assert_eq!(bg.sample(0, 0, TOTAL), 0x123456);
        assert_eq!(bg.sample(300, 200, TOTAL), 0x123456);
    }

    #[test]
    fn test_grid_cells_alternate() {
        let bg = Background::new(BackgroundStyle::Grid, 0x202020, 0x282828, 0, 0);

        assert_eq!(bg.sample(100, 0, TOTAL), 0x202020);
        assert_eq!(bg.sample(119, 0, TOTAL), 0x202020);
        assert_eq!(bg.sample(120, 0, TOTAL), 0x282828);
        assert_eq!(bg.sample(120, 30, TOTAL), 0x202020);
    }

    #[test]
    fn test_grid_edges_fade() {
        let bg = Background::new(BackgroundStyle::Grid, 0x202020, 0x282828, 0, 0);

        assert_eq!(bg.sample(0, 0, TOTAL), 0x1c1c1c);
        assert_eq!(bg.sample(639, 0, TOTAL), 0x141414);
    }

    #[test]
    fn test_strip_spans_gradient() {
        let bg = Background::new(BackgroundStyle::Strip, 0, 0, 0x000000, 0xff00ff);

        assert_eq!(bg.sample(0, 0, TOTAL), 0x000000);
        assert_eq!(bg.sample(0, 479, TOTAL), 0xff00ff);

        let middle = bg.sample(0, 240, TOTAL);
        assert!((0x70..0x90).contains(&(middle >> 16)));
        assert_eq!(middle >> 8 & 0xff, 0);
    }

    #[test]
    fn test_strip_is_monotonic() {
        let bg = Background::new(BackgroundStyle::Strip, 0, 0, 0x000000, 0x0000ff);

        let mut previous = 0;
        for y in 0..480 {
            let blue = bg.sample(0, y, TOTAL) & 0xff;
            assert!(blue >= previous);
            previous = blue;
        }
    }

    #[test]
    fn test_set_colour_reports_change() {
        let mut bg = Background::new(BackgroundStyle::Solid, 0x202020, 0, 0, 0);

        assert!(!bg.set_colour(0x202020));
        assert!(bg.set_colour(0x303030));
        assert_eq!(bg.colour(), 0x303030);
        assert!(bg.set_style(BackgroundStyle::Grid));
        assert!(!bg.set_style(BackgroundStyle::Grid));
    }
}
