//! Blend Pass
//!
//! Resolves every desktop pixel whose topmost display is not opaque there.
//! Each scanline is cut into sections owned by the topmost display at that
//! point; solid sections were already written by the solid pass and are
//! skipped, transparent ones are blended pixel by pixel down the stack.
//!
//! 32-bit framebuffers are written through their channel layout directly.
//! Formats without alpha get the same blended colour through
//! [`BufferFormat::encode`].

use crate::background::Background;
use crate::config::BLEND_CHUNK_PIXELS;
use crate::display::Display;
use crate::format::{BufferFormat, ChannelLayout};
use crate::framebuffer::FramebufferRegistry;
use crate::rect::Rect;
use crate::scene::SceneGraph;

/// Part of a scanline owned by one display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    /// No display here, `[x, end)` belongs to the background
    Uncovered { end: i32 },
    /// Inside the display's solid area
    Solid { pos: usize, end: i32 },
    /// Needs blending, starting at the display at `pos`
    Transparent { pos: usize, end: i32 },
}

impl Section {
    fn end(&self) -> i32 {
        match *self {
            Section::Uncovered { end }
            | Section::Solid { end, .. }
            | Section::Transparent { end, .. } => end,
        }
    }
}

/// Classify the section of row `y` that starts at `x` and runs at most to
/// `limit`.
pub(crate) fn find_section(scene: &SceneGraph, x: i32, y: i32, limit: i32) -> Section {
    let top = (0..scene.len())
        .rev()
        .find(|&pos| scene.at(pos).is_some_and(|d| d.covers(x, y)));

    let Some(pos) = top else {
        let end = scene
            .iter()
            .filter_map(|d| d.visible_row_extent(y))
            .map(|(start, _)| start)
            .filter(|&start| start > x)
            .fold(limit, i32::min);
        return Section::Uncovered { end };
    };

    let Some(display) = scene.at(pos) else {
        return Section::Uncovered { end: limit };
    };
    let mut end = display
        .visible_row_extent(y)
        .map_or(limit, |(_, x2)| x2.min(limit));

    // A higher display starting inside the section takes over from there.
    for above in scene.above(pos) {
        if let Some((start, _)) = above.visible_row_extent(y) {
            if start > x && start < end {
                end = start;
            }
        }
    }

    let solid = display.screen_solid_area();
    if y >= solid.y1 && y < solid.y2 {
        if x >= solid.x1 && x < solid.x2 {
            return Section::Solid {
                pos,
                end: end.min(solid.x2),
            };
        }
        if solid.x1 > x && solid.x2 > solid.x1 {
            end = end.min(solid.x1);
        }
    }

    Section::Transparent { pos, end }
}

/// Read `(a, r, g, b)` of a display at local `(x, y)`.
#[inline]
fn sample(
    display: &Display,
    layout: Option<ChannelLayout>,
    x: i32,
    y: i32,
) -> (u32, u32, u32, u32) {
    let scale = display.scale as u32;
    let (bx, by) = (x as u32 / scale, y as u32 / scale);

    match layout {
        Some(layout) => display
            .buffer
            .pixel_bytes(bx, by)
            .map_or((0, 0, 0, 0), |px| {
                let (a, r, g, b) = layout.read(px);
                (a as u32, r as u32, g as u32, b as u32)
            }),
        None => {
            let [a, r, g, b] = display.pixel(x, y).to_be_bytes();
            (a as u32, r as u32, g as u32, b as u32)
        }
    }
}

/// Composite desktop pixel `(x, y)` starting from the display at `pos` and
/// descending. Returns `(r, g, b)`.
///
/// Every non-opaque contributor adds its colour weighted by its alpha and
/// by the visibility left over from the displays above it. A pixel inside
/// a solid area takes all remaining visibility and ends the descent. What
/// visibility remains at the bottom goes to the background.
pub(crate) fn blend_pixel(
    scene: &SceneGraph,
    background: &Background,
    total: Rect,
    pos: usize,
    x: i32,
    y: i32,
) -> (u8, u8, u8) {
    let mut visibility = 255u32;
    let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);

    for display in scene.below(pos + 1) {
        if !display.covers(x, y) {
            continue;
        }

        let (lx, ly) = (x - display.x, y - display.y);
        let buffer = &display.buffer;
        let layout = buffer.format().has_alpha().then(|| buffer.order().layout());
        let (a, pr, pg, pb) = sample(display, layout, lx, ly);

        let solid = display.solid_area.contains(lx, ly);
        let weight = if solid { visibility } else { a * visibility / 255 };

        r = (r + pr * weight / 255).min(255);
        g = (g + pg * weight / 255).min(255);
        b = (b + pb * weight / 255).min(255);

        if solid {
            return (r as u8, g as u8, b as u8);
        }

        visibility -= weight;
        if visibility == 0 {
            return (r as u8, g as u8, b as u8);
        }
    }

    let bg = background.sample(x, y, total);
    r = (r + (bg >> 16 & 0xff) * visibility / 255).min(255);
    g = (g + (bg >> 8 & 0xff) * visibility / 255).min(255);
    b = (b + (bg & 0xff) * visibility / 255).min(255);
    (r as u8, g as u8, b as u8)
}

/// Blend every non-opaque covered pixel of `rect`. Returns the number of
/// pixels written.
pub(crate) fn paint_area_transparency(
    scene: &SceneGraph,
    framebuffers: &mut FramebufferRegistry,
    background: &Background,
    rect: Rect,
) -> u64 {
    let total = framebuffers.total_area();
    let mut written = 0u64;
    let mut chunk = [0u8; BLEND_CHUNK_PIXELS * 4];

    for mut target in framebuffers.targets() {
        let (format, order) = (target.format(), target.order());
        let layout = format.has_alpha().then(|| order.layout());
        let bpp = format.bytes_per_pixel();
        let area = rect.intersect(&target.area());

        for y in area.y1..area.y2 {
            let mut x = area.x1;

            while x < area.x2 {
                let section = find_section(scene, x, y, area.x2);
                let end = section.end().max(x + 1);

                if let Section::Transparent { pos, .. } = section {
                    let mut start = x;
                    while start < end {
                        let count = ((end - start) as usize).min(BLEND_CHUNK_PIXELS);

                        let bytes = &mut chunk[..count * bpp];
                        for (i, px) in bytes.chunks_exact_mut(bpp).enumerate() {
                            let x = start + i as i32;
                            let (r, g, b) = blend_pixel(scene, background, total, pos, x, y);
                            match layout {
                                Some(layout) => layout.write(px, 0xff, r, g, b),
                                None => {
                                    let colour = u32::from_be_bytes([0xff, r, g, b]);
                                    format.encode(order, colour, px);
                                }
                            }
                        }

                        if let Some(span) = target.span_mut(start, y, count) {
                            span.copy_from_slice(bytes);
                            written += count as u64;
                        }
                        start += count as i32;
                    }
                }

                x = end;
            }
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundStyle;
    use crate::buffer::PixelBuffer;
    use crate::display::{DisplayId, DisplayLayer};
    use crate::format::ChannelOrder;
    use crate::framebuffer::{host_framebuffer, DriverId};
    use alloc::vec;

    fn add(scene: &mut SceneGraph, rect: Rect, colour: u32, solid: Rect) -> DisplayId {
        scene.insert_with(|id| {
            let mut buffer = PixelBuffer::try_new(
                rect.width() as u32,
                rect.height() as u32,
                BufferFormat::Rgba8,
                ChannelOrder::Bgra,
            )
            .unwrap();
            buffer.fill(colour);
            let mut display = Display::new(id, None, DisplayLayer::Regular, buffer, 1);
            display.x = rect.x1;
            display.y = rect.y1;
            display.solid_area = solid;
            display.visible = true;
            display
        })
    }

    fn black() -> Background {
        Background::new(BackgroundStyle::Solid, 0x000000, 0, 0, 0)
    }

    const TOTAL: Rect = Rect::new(0, 0, 64, 64);

    #[test]
    fn test_sections_follow_topmost_display() {
        let mut scene = SceneGraph::new();
        add(
            &mut scene,
            Rect::new(0, 0, 40, 10),
            0xffff0000,
            Rect::new(0, 0, 40, 10),
        );
        add(
            &mut scene,
            Rect::new(10, 0, 20, 10),
            0x00000000,
            Rect::EMPTY,
        );

        assert_eq!(
            find_section(&scene, 0, 0, 64),
            Section::Solid { pos: 0, end: 10 }
        );
        assert_eq!(
            find_section(&scene, 10, 0, 64),
            Section::Transparent { pos: 1, end: 20 }
        );
        assert_eq!(
            find_section(&scene, 20, 0, 64),
            Section::Solid { pos: 0, end: 40 }
        );
        assert_eq!(
            find_section(&scene, 40, 0, 64),
            Section::Uncovered { end: 64 }
        );
    }

    #[test]
    fn test_transparent_section_stops_at_solid_area() {
        let mut scene = SceneGraph::new();
        add(
            &mut scene,
            Rect::new(0, 0, 30, 10),
            0xff0000ff,
            Rect::new(10, 0, 20, 10),
        );

        assert_eq!(
            find_section(&scene, 0, 5, 64),
            Section::Transparent { pos: 0, end: 10 }
        );
        assert_eq!(
            find_section(&scene, 10, 5, 64),
            Section::Solid { pos: 0, end: 20 }
        );
        assert_eq!(
            find_section(&scene, 20, 5, 64),
            Section::Transparent { pos: 0, end: 30 }
        );
    }

    #[test]
    fn test_uncovered_section_ends_at_next_display() {
        let mut scene = SceneGraph::new();
        add(&mut scene, Rect::new(20, 0, 30, 10), 0, Rect::EMPTY);

        assert_eq!(
            find_section(&scene, 0, 0, 64),
            Section::Uncovered { end: 20 }
        );
        assert_eq!(
            find_section(&scene, 0, 10, 64),
            Section::Uncovered { end: 64 }
        );
    }

    #[test]
    fn test_half_alpha_over_opaque() {
        let mut scene = SceneGraph::new();
        add(
            &mut scene,
            Rect::new(0, 0, 8, 8),
            0xff00c800,
            Rect::new(0, 0, 8, 8),
        );
        add(&mut scene, Rect::new(0, 0, 8, 8), 0x80ff0000, Rect::EMPTY);

        let (r, g, b) = blend_pixel(&scene, &black(), TOTAL, 1, 3, 3);

        assert_eq!(r as u32, 255 * 128 / 255);
        assert_eq!(g as u32, 200 * 127 / 255);
        assert_eq!(b, 0);
    }

    #[test]
    fn test_opaque_top_skips_background() {
        let mut scene = SceneGraph::new();
        add(
            &mut scene,
            Rect::new(0, 0, 8, 8),
            0xff102030,
            Rect::new(0, 0, 8, 8),
        );
        let white = Background::new(BackgroundStyle::Solid, 0xffffff, 0, 0, 0);

        assert_eq!(
            blend_pixel(&scene, &white, TOTAL, 0, 1, 1),
            (0x10, 0x20, 0x30)
        );
    }

    #[test]
    fn test_transparent_falls_through_to_background() {
        let mut scene = SceneGraph::new();
        add(&mut scene, Rect::new(0, 0, 8, 8), 0x00ffffff, Rect::EMPTY);
        let grey = Background::new(BackgroundStyle::Solid, 0x404040, 0, 0, 0);

        assert_eq!(
            blend_pixel(&scene, &grey, TOTAL, 0, 1, 1),
            (0x40, 0x40, 0x40)
        );
    }

    #[test]
    fn test_full_alpha_outside_solid_area_is_opaque() {
        let mut scene = SceneGraph::new();
        add(&mut scene, Rect::new(0, 0, 8, 8), 0xff0000ff, Rect::EMPTY);
        let white = Background::new(BackgroundStyle::Solid, 0xffffff, 0, 0, 0);

        assert_eq!(blend_pixel(&scene, &white, TOTAL, 0, 1, 1), (0, 0, 0xff));
    }

    #[test]
    fn test_paint_area_transparency_writes_only_transparent_sections() {
        let mut framebuffers = FramebufferRegistry::new();
        framebuffers.add_driver(DriverId(0), vec![host_framebuffer(16, 4)]).unwrap();
        framebuffers.retile();

        let mut scene = SceneGraph::new();
        add(
            &mut scene,
            Rect::new(0, 0, 8, 4),
            0xffff0000,
            Rect::new(0, 0, 8, 4),
        );
        add(&mut scene, Rect::new(4, 0, 12, 4), 0x800000ff, Rect::EMPTY);

        let written =
            paint_area_transparency(&scene, &mut framebuffers, &black(), Rect::new(0, 0, 16, 4));

        assert_eq!(written, 8 * 4);
        let fb = framebuffers.get(0).unwrap();
        let region = fb.region(fb.area()).unwrap();
        assert_eq!(region.pixel(0, 0), Some(0));
        assert_eq!(region.pixel(5, 0), Some(0xff7f0080));
        assert_eq!(region.pixel(10, 0), Some(0xff000080));
        assert_eq!(region.pixel(12, 0), Some(0));
    }
}
