//! Shared helpers for the compositor integration tests.
//!
//! Framebuffers are plain host memory leaked for the lifetime of the test
//! process and registered through the same descriptor a driver would use.

#![allow(dead_code)]

use kpio_display::{
    Background, BufferFormat, ChannelOrder, Compositor, CompositorConfig, DisplayId, DisplayLayer,
    DriverId, FramebufferDescriptor, Rect,
};

/// Leak `width x height` pixels of host memory as a framebuffer.
pub fn host_framebuffer(width: u32, height: u32, format: BufferFormat) -> FramebufferDescriptor {
    let stride = width as usize * format.bytes_per_pixel();
    let memory: &'static mut [u8] =
        Box::leak(vec![0u8; stride * height as usize].into_boxed_slice());

    // SAFETY: the allocation is leaked, so it outlives the descriptor, and
    // nothing else holds a reference to it.
    unsafe {
        FramebufferDescriptor::new(
            memory.as_mut_ptr(),
            stride,
            width,
            height,
            format,
            ChannelOrder::Bgra,
        )
    }
    .expect("leaked memory is never null")
}

/// A compositor driving one 32-bit framebuffer.
pub fn compositor(width: u32, height: u32) -> Compositor {
    compositor_with(CompositorConfig::default(), &[(width, height)])
}

/// A compositor with one 32-bit framebuffer per entry of `sizes`.
pub fn compositor_with(config: CompositorConfig, sizes: &[(u32, u32)]) -> Compositor {
    let mut compositor = Compositor::new(config);
    let descriptors = sizes
        .iter()
        .map(|&(w, h)| host_framebuffer(w, h, BufferFormat::Rgba8))
        .collect();
    compositor
        .register_driver(DriverId(0), descriptors)
        .expect("host framebuffers are valid");
    compositor
}

/// The background generator the compositor was configured with.
pub fn background_of(compositor: &Compositor) -> Background {
    let config = compositor.config();
    Background::new(
        config.background,
        config.background_colour,
        config.background_colour2,
        config.strip_top,
        config.strip_bottom,
    )
}

/// Desktop pixel as `0xAARRGGBB`.
pub fn pixel(compositor: &Compositor, x: i32, y: i32) -> u32 {
    (0..compositor.screen_count())
        .find_map(|fb| compositor.get_screen_buffer(fb, Rect::new(x, y, x + 1, y + 1)))
        .and_then(|region| region.pixel(0, 0))
        .unwrap_or_else(|| panic!("no framebuffer at ({x}, {y})"))
}

/// Every desktop pixel, row by row.
pub fn snapshot(compositor: &Compositor) -> Vec<u32> {
    let total = compositor.total_area();
    let mut pixels = Vec::with_capacity(total.area() as usize);
    for y in total.y1..total.y2 {
        for x in total.x1..total.x2 {
            pixels.push(pixel(compositor, x, y));
        }
    }
    pixels
}

/// Create, fill, place and show a display covering desktop `rect`.
pub fn filled_display(
    compositor: &mut Compositor,
    layer: DisplayLayer,
    rect: Rect,
    colour: u32,
) -> DisplayId {
    let id = compositor
        .create_display(None, layer, rect.width() as u32, rect.height() as u32, 1)
        .expect("display fits in memory");
    compositor.buffer_mut(id).expect("just created").fill(colour);
    compositor.move_to(id, rect.x1, rect.y1, false);
    compositor.show(id);
    id
}

/// What the desktop must show at `(x, y)` when every display is opaque
/// where it is visible: the topmost covering display, else the background.
pub fn expected_opaque(compositor: &Compositor, background: &Background, x: i32, y: i32) -> u32 {
    compositor
        .scene()
        .iter()
        .rev()
        .find(|d| d.covers(x, y))
        .map(|d| d.pixel(x - d.x(), y - d.y()))
        .unwrap_or_else(|| 0xff00_0000 | background.sample(x, y, compositor.total_area()))
}

/// Everything needed to place one display on a property-test desktop.
#[derive(Debug, Clone)]
pub struct DisplaySetup {
    pub rect: Rect,
    pub colour: u32,
    pub layer: DisplayLayer,
    /// Local coordinates, clipped by the compositor
    pub solid: Rect,
}

pub const LAYERS: [DisplayLayer; 3] = [
    DisplayLayer::BottomMost,
    DisplayLayer::Regular,
    DisplayLayer::TopMost,
];

/// Displays of 16..40 x 16..32 pixels, some partly off a 64x48 desktop.
/// With `opaque` every colour has full alpha.
pub fn arb_display_setup(opaque: bool) -> impl proptest::strategy::Strategy<Value = DisplaySetup> {
    use proptest::prelude::*;

    (
        (-8i32..56, -8i32..40, 16i32..40, 16i32..32),
        any::<u32>(),
        0usize..LAYERS.len(),
        (0i32..40, 0i32..32, 0i32..40, 0i32..32),
    )
        .prop_map(move |((x, y, w, h), colour, layer, (sx, sy, sw, sh))| DisplaySetup {
            rect: Rect::new(x, y, x + w, y + h),
            colour: if opaque { colour | 0xff00_0000 } else { colour },
            layer: LAYERS[layer],
            solid: Rect::new(sx, sy, sx + sw, sy + sh),
        })
}

/// Two 32x48 framebuffers side by side.
pub fn property_desktop() -> Compositor {
    compositor_with(CompositorConfig::default(), &[(32, 48), (32, 48)])
}

/// Show every setup, in order, and return the handles.
pub fn build_scene(compositor: &mut Compositor, setups: &[DisplaySetup]) -> Vec<DisplayId> {
    setups
        .iter()
        .map(|setup| {
            let id = compositor
                .create_display(
                    None,
                    setup.layer,
                    setup.rect.width() as u32,
                    setup.rect.height() as u32,
                    1,
                )
                .expect("display fits in memory");
            compositor.buffer_mut(id).expect("just created").fill(setup.colour);
            compositor.set_solid_area(id, setup.solid);
            compositor.move_to(id, setup.rect.x1, setup.rect.y1, false);
            compositor.show(id);
            id
        })
        .collect()
}

/// [`expected_opaque`] over the whole desktop, in [`snapshot`] order.
pub fn expected_snapshot(compositor: &Compositor) -> Vec<u32> {
    let background = background_of(compositor);
    let total = compositor.total_area();
    let mut pixels = Vec::with_capacity(total.area() as usize);
    for y in total.y1..total.y2 {
        for x in total.x1..total.x2 {
            pixels.push(expected_opaque(compositor, &background, x, y));
        }
    }
    pixels
}
