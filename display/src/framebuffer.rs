//! Framebuffer registry.
//!
//! Graphics drivers hand the compositor one [`FramebufferDescriptor`] per
//! output. Registered framebuffers are tiled left to right into a single
//! virtual desktop. While a driver changes mode, the affected framebuffer
//! has no memory and every compositing pass skips it.

use alloc::vec::Vec;
use core::ptr::NonNull;
use core::slice;

use crate::buffer::ScreenRegion;
use crate::format::{BufferFormat, ChannelOrder};
use crate::rect::Rect;
use crate::DisplayError;

/// Identifies the graphics driver that owns a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverId(pub u32);

/// Driver-supplied description of framebuffer memory.
#[derive(Debug)]
pub struct FramebufferDescriptor {
    /// Base address of the mapped framebuffer
    address: NonNull<u8>,
    /// Bytes per row
    stride: usize,
    /// Width in pixels
    width: u32,
    /// Height in pixels
    height: u32,
    /// Pixel format
    format: BufferFormat,
    /// Channel byte order
    order: ChannelOrder,
}

// SAFETY: the descriptor is only dereferenced through `&self`/`&mut self`,
// and the compositor holding it is serialized by its lock.
unsafe impl Send for FramebufferDescriptor {}

impl FramebufferDescriptor {
    /// Describe framebuffer memory. Returns `None` for a null address.
    ///
    /// # Safety
    /// `address` must point to at least `stride * height` bytes that are
    /// valid for reads and writes, are not accessed through any other path
    /// while the compositor holds the descriptor, and stay mapped until the
    /// driver reports the framebuffer changing or unregisters.
    pub unsafe fn new(
        address: *mut u8,
        stride: usize,
        width: u32,
        height: u32,
        format: BufferFormat,
        order: ChannelOrder,
    ) -> Option<Self> {
        Some(Self {
            address: NonNull::new(address)?,
            stride,
            width,
            height,
            format,
            order,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn format(&self) -> BufferFormat {
        self.format
    }

    #[inline]
    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    fn byte_len(&self) -> usize {
        self.stride * self.height as usize
    }

    fn validate(&self) -> Result<(), DisplayError> {
        let row = self.width as usize * self.format.bytes_per_pixel();
        if self.width == 0 || self.height == 0 || self.stride < row {
            return Err(DisplayError::InvalidFramebuffer);
        }
        Ok(())
    }

    fn bytes(&self) -> &[u8] {
        // SAFETY: `new` requires `stride * height` readable bytes.
        unsafe { slice::from_raw_parts(self.address.as_ptr(), self.byte_len()) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: `new` requires `stride * height` writable bytes with no
        // other live access; `&mut self` keeps this slice unique.
        unsafe { slice::from_raw_parts_mut(self.address.as_ptr(), self.byte_len()) }
    }
}

/// A registered output surface.
#[derive(Debug)]
pub struct Framebuffer {
    /// Owning driver
    driver: DriverId,
    /// Index of this framebuffer within its driver
    index: u32,
    /// Framebuffer memory, `None` while the driver is changing mode
    memory: Option<FramebufferDescriptor>,
    /// Placement within the virtual desktop
    area: Rect,
}

impl Framebuffer {
    #[inline]
    pub fn driver(&self) -> DriverId {
        self.driver
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Screen-space placement; empty until tiled.
    #[inline]
    pub fn area(&self) -> Rect {
        self.area
    }

    /// Whether the framebuffer currently has memory to draw into.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.memory.is_some()
    }

    pub fn descriptor(&self) -> Option<&FramebufferDescriptor> {
        self.memory.as_ref()
    }

    /// Writable view for the compositing passes.
    pub(crate) fn target(&mut self) -> Option<ScreenTarget<'_>> {
        let area = self.area;
        let memory = self.memory.as_mut()?;
        if area.is_empty() {
            return None;
        }

        let (stride, format, order) = (memory.stride, memory.format, memory.order);
        Some(ScreenTarget {
            bytes: memory.bytes_mut(),
            stride,
            format,
            order,
            area,
        })
    }

    /// Read-only view of a framebuffer-local rectangle.
    pub(crate) fn region(&self, rect: Rect) -> Option<ScreenRegion<'_>> {
        let memory = self.memory.as_ref()?;
        let rect = rect.intersect(&Rect::from_size(0, 0, memory.width, memory.height));
        if rect.is_empty() {
            return None;
        }

        Some(ScreenRegion::new(
            memory.bytes(),
            memory.stride,
            memory.format,
            memory.order,
            rect,
        ))
    }
}

/// Mutable framebuffer memory addressed in screen coordinates.
pub(crate) struct ScreenTarget<'a> {
    bytes: &'a mut [u8],
    stride: usize,
    format: BufferFormat,
    order: ChannelOrder,
    area: Rect,
}

impl<'a> ScreenTarget<'a> {
    #[inline]
    pub(crate) fn area(&self) -> Rect {
        self.area
    }

    #[inline]
    pub(crate) fn format(&self) -> BufferFormat {
        self.format
    }

    #[inline]
    pub(crate) fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Bytes for `len` pixels starting at screen position `(x, y)`, or
    /// `None` if any of them falls outside this framebuffer.
    pub(crate) fn span_mut(&mut self, x: i32, y: i32, len: usize) -> Option<&mut [u8]> {
        if !self.area.contains(x, y) || x as i64 + len as i64 > self.area.x2 as i64 {
            return None;
        }

        let bpp = self.format.bytes_per_pixel();
        let start = (y - self.area.y1) as usize * self.stride + (x - self.area.x1) as usize * bpp;
        self.bytes.get_mut(start..start + len * bpp)
    }

    /// Write `colour` into `len` pixels starting at `(x, y)`.
    pub(crate) fn fill_span(&mut self, x: i32, y: i32, len: usize, colour: u32) -> bool {
        let (format, order) = (self.format, self.order);
        let bpp = format.bytes_per_pixel();
        let mut packed = [0u8; 4];
        format.encode(order, colour, &mut packed);

        let Some(span) = self.span_mut(x, y, len) else {
            return false;
        };
        for pixel in span.chunks_exact_mut(bpp) {
            pixel.copy_from_slice(&packed[..bpp]);
        }
        true
    }
}

/// Ordered set of framebuffers and their combined desktop area.
#[derive(Debug, Default)]
pub struct FramebufferRegistry {
    framebuffers: Vec<Framebuffer>,
    total_area: Rect,
}

impl FramebufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every framebuffer a newly started driver reports.
    pub fn add_driver(
        &mut self,
        driver: DriverId,
        descriptors: Vec<FramebufferDescriptor>,
    ) -> Result<(), DisplayError> {
        if let Some(err) = descriptors.iter().find_map(|d| d.validate().err()) {
            log::warn!(
                "[KPIO Display] Rejected framebuffers from driver {:?}",
                driver
            );
            return Err(err);
        }

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            log::info!(
                "[KPIO Display] Framebuffer {}:{} {}x{} {}",
                driver.0,
                index,
                descriptor.width,
                descriptor.height,
                descriptor.format.name()
            );
            self.framebuffers.push(Framebuffer {
                driver,
                index: index as u32,
                memory: Some(descriptor),
                area: Rect::EMPTY,
            });
        }
        Ok(())
    }

    /// Forget every framebuffer of a stopped driver.
    pub fn remove_driver(&mut self, driver: DriverId) -> bool {
        let before = self.framebuffers.len();
        self.framebuffers.retain(|fb| fb.driver != driver);
        self.framebuffers.len() != before
    }

    /// Drop a framebuffer's memory ahead of a mode change.
    pub fn invalidate(&mut self, driver: DriverId, index: u32) -> bool {
        match self.find_mut(driver, index) {
            Some(fb) => {
                fb.memory = None;
                fb.area = Rect::EMPTY;
                true
            }
            None => false,
        }
    }

    /// Attach new memory after a mode change. The area is cleared so the
    /// next [`retile`](Self::retile) reports it as changed.
    pub fn revalidate(
        &mut self,
        driver: DriverId,
        index: u32,
        descriptor: FramebufferDescriptor,
    ) -> Result<bool, DisplayError> {
        descriptor.validate()?;

        match self.find_mut(driver, index) {
            Some(fb) => {
                fb.memory = Some(descriptor);
                fb.area = Rect::EMPTY;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Lay framebuffers out left to right and recompute the desktop area.
    ///
    /// Tiling stops at the first framebuffer without memory, since every
    /// position after it depends on its width. Returns the areas whose
    /// placement changed.
    pub fn retile(&mut self) -> Vec<Rect> {
        let mut changed = Vec::new();
        let mut x = 0;
        let mut total = Rect::EMPTY;

        for fb in &mut self.framebuffers {
            let Some(memory) = &fb.memory else {
                break;
            };

            let area = Rect::from_size(x, 0, memory.width, memory.height);
            total = total.include(&area);

            if fb.area != area {
                fb.area = area;
                changed.push(area);
            }

            x = area.x2;
        }

        self.total_area = total;
        changed
    }

    fn find_mut(&mut self, driver: DriverId, index: u32) -> Option<&mut Framebuffer> {
        self.framebuffers
            .iter_mut()
            .find(|fb| fb.driver == driver && fb.index == index)
    }

    /// Combined area of all tiled framebuffers.
    #[inline]
    pub fn total_area(&self) -> Rect {
        self.total_area
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Framebuffer> {
        self.framebuffers.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Framebuffer> {
        self.framebuffers.iter()
    }

    /// Format, order and area of the first framebuffer that has memory.
    pub fn primary(&self) -> Option<(BufferFormat, ChannelOrder, Rect)> {
        self.framebuffers.iter().find_map(|fb| {
            fb.memory
                .as_ref()
                .map(|memory| (memory.format, memory.order, fb.area))
        })
    }

    /// Writable views of every available, tiled framebuffer.
    pub(crate) fn targets(&mut self) -> impl Iterator<Item = ScreenTarget<'_>> {
        self.framebuffers.iter_mut().filter_map(Framebuffer::target)
    }
}

/// Host memory posing as a framebuffer, for tests.
#[cfg(test)]
pub(crate) fn host_framebuffer(width: u32, height: u32) -> FramebufferDescriptor {
    let stride = width as usize * 4;
    let memory: &'static mut [u8] = alloc::boxed::Box::leak(
        alloc::vec![0u8; stride * height as usize].into_boxed_slice(),
    );

    // SAFETY: the leaked allocation lives forever and is only reached
    // through this descriptor.
    unsafe {
        FramebufferDescriptor::new(
            memory.as_mut_ptr(),
            stride,
            width,
            height,
            BufferFormat::Rgba8,
            ChannelOrder::Bgra,
        )
    }
    .unwrap()
}
