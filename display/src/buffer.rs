//! Pixel buffers.
//!
//! [`PixelBuffer`] is the exclusively owned off-screen storage behind every
//! display. [`ScreenRegion`] is a read-only view into framebuffer memory.

use alloc::vec::Vec;

use crate::format::{BufferFormat, ChannelOrder};
use crate::rect::Rect;
use crate::DisplayError;

/// Off-screen pixel storage for a display.
#[derive(Debug)]
pub struct PixelBuffer {
    /// Pixel data, `stride * height` bytes
    data: Vec<u8>,
    /// Width in pixels
    width: u32,
    /// Height in pixels
    height: u32,
    /// Bytes per row
    stride: usize,
    /// Pixel format
    format: BufferFormat,
    /// Channel byte order
    order: ChannelOrder,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer.
    ///
    /// Allocation failure is reported instead of aborting, since display
    /// buffers are the one large allocation a client can request.
    pub fn try_new(
        width: u32,
        height: u32,
        format: BufferFormat,
        order: ChannelOrder,
    ) -> Result<Self, DisplayError> {
        let stride = (width as usize)
            .checked_mul(format.bytes_per_pixel())
            .ok_or(DisplayError::OutOfMemory)?;
        let size = stride
            .checked_mul(height as usize)
            .ok_or(DisplayError::OutOfMemory)?;

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| DisplayError::OutOfMemory)?;
        data.resize(size, 0);

        Ok(Self {
            data,
            width,
            height,
            stride,
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

    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    /// Raw pixel bytes
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw pixel bytes
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes of one scanline.
    #[inline]
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let start = y as usize * self.stride;
        self.data.get(start..start + self.stride)
    }

    /// Mutable bytes of one scanline.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        let start = y as usize * self.stride;
        self.data.get_mut(start..start + self.stride)
    }

    /// Bytes of a single pixel.
    #[inline]
    pub fn pixel_bytes(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.bytes_per_pixel();
        let offset = y as usize * self.stride + x as usize * bpp;
        self.data.get(offset..offset + bpp)
    }

    /// Get pixel at coordinates as `0xAARRGGBB`
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        self.pixel_bytes(x, y)
            .map(|bytes| self.format.decode(self.order, bytes))
    }

    /// Set pixel at coordinates from `0xAARRGGBB`
    pub fn set(&mut self, x: u32, y: u32, colour: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let bpp = self.bytes_per_pixel();
        let offset = y as usize * self.stride + x as usize * bpp;
        let (format, order) = (self.format, self.order);
        format.encode(order, colour, &mut self.data[offset..offset + bpp]);
    }

    /// Fill entire buffer with a colour
    pub fn fill(&mut self, colour: u32) {
        self.fill_rect(Rect::from_size(0, 0, self.width, self.height), colour);
    }

    /// Fill a rectangle with a colour. The rectangle is clipped to the buffer.
    pub fn fill_rect(&mut self, rect: Rect, colour: u32) {
        let rect = rect.intersect(&Rect::from_size(0, 0, self.width, self.height));
        if rect.is_empty() {
            return;
        }

        let bpp = self.bytes_per_pixel();
        let mut packed = [0u8; 4];
        self.format.encode(self.order, colour, &mut packed);

        for y in rect.y1..rect.y2 {
            let Some(row) = self.row_mut(y as u32) else {
                break;
            };
            let span = &mut row[rect.x1 as usize * bpp..rect.x2 as usize * bpp];
            for pixel in span.chunks_exact_mut(bpp) {
                pixel.copy_from_slice(&packed[..bpp]);
            }
        }
    }

    /// Clear to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

/// Read-only view of a rectangle of framebuffer memory.
///
/// Returned by [`Compositor::get_screen_buffer`](crate::Compositor::get_screen_buffer).
/// Coordinates passed to its accessors are relative to the region origin.
#[derive(Debug)]
pub struct ScreenRegion<'a> {
    memory: &'a [u8],
    stride: usize,
    format: BufferFormat,
    order: ChannelOrder,
    /// Region within the framebuffer, in framebuffer pixels
    rect: Rect,
}

impl<'a> ScreenRegion<'a> {
    pub(crate) fn new(
        memory: &'a [u8],
        stride: usize,
        format: BufferFormat,
        order: ChannelOrder,
        rect: Rect,
    ) -> Self {
        Self {
            memory,
            stride,
            format,
            order,
            rect,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.rect.width() as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.rect.height() as u32
    }

    #[inline]
    pub fn format(&self) -> BufferFormat {
        self.format
    }

    #[inline]
    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Position of the region within its framebuffer.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Bytes of one row of the region.
    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        if y >= self.height() {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let row = self.rect.y1 as usize + y as usize;
        let start = row * self.stride + self.rect.x1 as usize * bpp;
        self.memory.get(start..start + self.width() as usize * bpp)
    }

    /// Pixel at region coordinates as `0xAARRGGBB`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width() {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let row = self.row(y)?;
        let offset = x as usize * bpp;
        row.get(offset..offset + bpp)
            .map(|bytes| self.format.decode(self.order, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_zeroed() {
        let buffer = PixelBuffer::try_new(8, 4, BufferFormat::Rgba8, ChannelOrder::Bgra).unwrap();

        assert_eq!(buffer.stride(), 32);
        assert_eq!(buffer.data().len(), 128);
        assert!(buffer.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_set_get_pixel() {
        let mut buffer =
            PixelBuffer::try_new(4, 4, BufferFormat::Rgba8, ChannelOrder::Bgra).unwrap();

        buffer.set(1, 2, 0xc80000ff);
        assert_eq!(buffer.get(1, 2), Some(0xc80000ff));
        assert_eq!(buffer.get(2, 1), Some(0));
        assert_eq!(buffer.get(4, 0), None);

        // Out of range writes are ignored
        buffer.set(9, 9, 0xffffffff);
    }

    #[test]
    fn test_fill_rect_is_clipped() {
        let mut buffer =
            PixelBuffer::try_new(4, 4, BufferFormat::Rgba8, ChannelOrder::Argb).unwrap();

        buffer.fill_rect(Rect::new(2, 2, 10, 10), 0xffff0000);

        assert_eq!(buffer.get(1, 1), Some(0));
        assert_eq!(buffer.get(2, 2), Some(0xffff0000));
        assert_eq!(buffer.get(3, 3), Some(0xffff0000));
    }

    #[test]
    fn test_oversized_buffer_reports_out_of_memory() {
        let result =
            PixelBuffer::try_new(u32::MAX, u32::MAX, BufferFormat::Rgba8, ChannelOrder::Bgra);

        assert_eq!(result.err(), Some(DisplayError::OutOfMemory));
    }

    #[test]
    fn test_screen_region_reads_relative_to_origin() {
        let mut memory = alloc::vec![0u8; 4 * 4 * 4];
        BufferFormat::Rgba8.encode(
            ChannelOrder::Bgra,
            0xff123456,
            &mut memory[(2 * 4 + 3) * 4..],
        );

        let region = ScreenRegion::new(
            &memory,
            16,
            BufferFormat::Rgba8,
            ChannelOrder::Bgra,
            Rect::new(1, 1, 4, 4),
        );

        assert_eq!(region.width(), 3);
        assert_eq!(region.pixel(2, 1), Some(0xff123456));
        assert_eq!(region.pixel(3, 0), None);
    }
}
