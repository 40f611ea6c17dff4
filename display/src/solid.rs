//! Solid Pass
//!
//! Copies the opaque part of a display straight into framebuffer memory.
//! Only spans that no higher display covers are written, so each opaque
//! pixel is written once, by the display actually seen there.

use crate::display::Display;
use crate::framebuffer::{FramebufferRegistry, ScreenTarget};
use crate::rect::Rect;
use crate::scene::SceneGraph;
use crate::span::for_each_uncovered;

/// Copy `local` (clipped to the solid area) of the display at paint
/// position `pos` to every framebuffer it overlaps. Returns the number of
/// pixels written.
pub(crate) fn paint_display_solid(
    scene: &SceneGraph,
    framebuffers: &mut FramebufferRegistry,
    pos: usize,
    local: Rect,
) -> u64 {
    let Some(display) = scene.at(pos) else {
        return 0;
    };
    if !display.visible {
        return 0;
    }

    let screen = local.intersect(&display.solid_area).offset(display.x, display.y);
    if screen.is_empty() {
        return 0;
    }

    let mut written = 0u64;
    for mut target in framebuffers.targets() {
        let area = screen.intersect(&target.area());

        for y in area.y1..area.y2 {
            let Some((x1, x2)) = display.visible_row_extent(y) else {
                continue;
            };
            let (x1, x2) = (x1.max(area.x1), x2.min(area.x2));
            if x1 >= x2 {
                continue;
            }

            for_each_uncovered(
                x1,
                x2,
                || scene.above(pos).filter_map(move |d| d.visible_row_extent(y)),
                |start, end| written += copy_span(&mut target, display, start, end, y),
            );
        }
    }

    written
}

/// Copy desktop pixels `[x1, x2)` of row `y` from `display` to `target`.
fn copy_span(target: &mut ScreenTarget<'_>, display: &Display, x1: i32, x2: i32, y: i32) -> u64 {
    let buffer = &display.buffer;
    let scale = display.scale as i32;
    let (src_format, src_order) = (buffer.format(), buffer.order());
    let (dst_format, dst_order) = (target.format(), target.order());
    let src_bpp = src_format.bytes_per_pixel();
    let dst_bpp = dst_format.bytes_per_pixel();

    let Some(row) = buffer.row(((y - display.y) / scale) as u32) else {
        return 0;
    };
    let len = (x2 - x1) as usize;
    let Some(dst) = target.span_mut(x1, y, len) else {
        return 0;
    };
    let lx = x1 - display.x;

    if scale == 1 && src_format == dst_format && src_order == dst_order {
        let start = lx as usize * src_bpp;
        let Some(src) = row.get(start..start + len * src_bpp) else {
            return 0;
        };
        dst.copy_from_slice(src);
        return len as u64;
    }

    for (x, out) in (lx..).zip(dst.chunks_exact_mut(dst_bpp)) {
        let start = (x / scale) as usize * src_bpp;
        let Some(src) = row.get(start..start + src_bpp) else {
            break;
        };

        if src_format == dst_format && src_order == dst_order {
            out.copy_from_slice(src);
        } else {
            dst_format.encode(dst_order, src_format.decode(src_order, src), out);
        }
    }

    len as u64
}
