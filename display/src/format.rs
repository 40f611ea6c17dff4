//! Pixel formats.
//!
//! Colours cross the API as `0xAARRGGBB` words and are packed into the
//! byte layout of a framebuffer (or of a display buffer, which always
//! shares the layout of the first framebuffer).

/// Storage format of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    /// 8-bit greyscale
    Grey8,
    /// 16-bit RGB (5-6-5), little endian
    Rgb565,
    /// 24-bit colour
    Rgb8,
    /// 32-bit colour with alpha
    Rgba8,
}

impl BufferFormat {
    /// Bytes per pixel for this format
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            BufferFormat::Grey8 => 1,
            BufferFormat::Rgb565 => 2,
            BufferFormat::Rgb8 => 3,
            BufferFormat::Rgba8 => 4,
        }
    }

    /// Human readable name
    pub const fn name(self) -> &'static str {
        match self {
            BufferFormat::Grey8 => "8bit greyscale",
            BufferFormat::Rgb565 => "16bit colour",
            BufferFormat::Rgb8 => "24bit colour",
            BufferFormat::Rgba8 => "32bit colour",
        }
    }

    /// Whether this format carries an alpha channel (and so can be blended)
    #[inline]
    pub const fn has_alpha(self) -> bool {
        matches!(self, BufferFormat::Rgba8)
    }

    /// Pack `colour` (`0xAARRGGBB`) into `out`, which must hold at least
    /// [`bytes_per_pixel`](Self::bytes_per_pixel) bytes.
    pub fn encode(self, order: ChannelOrder, colour: u32, out: &mut [u8]) {
        let [a, r, g, b] = colour.to_be_bytes();

        match self {
            BufferFormat::Grey8 => {
                out[0] = luminance(r, g, b);
            }
            BufferFormat::Rgb565 => {
                let value = (r as u16 >> 3) << 11 | (g as u16 >> 2) << 5 | b as u16 >> 3;
                out[..2].copy_from_slice(&value.to_le_bytes());
            }
            BufferFormat::Rgb8 => match order {
                ChannelOrder::Bgra => out[..3].copy_from_slice(&[b, g, r]),
                ChannelOrder::Argb => out[..3].copy_from_slice(&[r, g, b]),
            },
            BufferFormat::Rgba8 => order.layout().write(out, a, r, g, b),
        }
    }

    /// Unpack one pixel into `0xAARRGGBB`. Formats without alpha decode as
    /// fully opaque.
    pub fn decode(self, order: ChannelOrder, bytes: &[u8]) -> u32 {
        match self {
            BufferFormat::Grey8 => {
                let v = bytes[0] as u32;
                0xff00_0000 | v << 16 | v << 8 | v
            }
            BufferFormat::Rgb565 => {
                let value = u16::from_le_bytes([bytes[0], bytes[1]]) as u32;
                let r = (value >> 11 & 0x1f) * 255 / 31;
                let g = (value >> 5 & 0x3f) * 255 / 63;
                let b = (value & 0x1f) * 255 / 31;
                0xff00_0000 | r << 16 | g << 8 | b
            }
            BufferFormat::Rgb8 => {
                let (r, g, b) = match order {
                    ChannelOrder::Bgra => (bytes[2], bytes[1], bytes[0]),
                    ChannelOrder::Argb => (bytes[0], bytes[1], bytes[2]),
                };
                u32::from_be_bytes([0xff, r, g, b])
            }
            BufferFormat::Rgba8 => {
                let layout = order.layout();
                u32::from_be_bytes([
                    bytes[layout.a],
                    bytes[layout.r],
                    bytes[layout.g],
                    bytes[layout.b],
                ])
            }
        }
    }
}

/// In-memory byte order of the colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOrder {
    /// Alpha, red, green, blue
    Argb,
    /// Blue, green, red, alpha
    Bgra,
}

impl ChannelOrder {
    /// Byte offsets of each channel within a 32-bit pixel.
    pub const fn layout(self) -> ChannelLayout {
        match self {
            ChannelOrder::Argb => ChannelLayout { a: 0, r: 1, g: 2, b: 3 },
            ChannelOrder::Bgra => ChannelLayout { a: 3, r: 2, g: 1, b: 0 },
        }
    }
}

/// Channel byte offsets inside a 32-bit pixel.
///
/// Resolved once per framebuffer so the blend loop indexes bytes directly
/// instead of matching on the channel order for every pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub a: usize,
    pub r: usize,
    pub g: usize,
    pub b: usize,
}

impl ChannelLayout {
    #[inline]
    pub fn write(&self, out: &mut [u8], a: u8, r: u8, g: u8, b: u8) {
        out[self.a] = a;
        out[self.r] = r;
        out[self.g] = g;
        out[self.b] = b;
    }

    /// Read `(a, r, g, b)` from a 32-bit pixel.
    #[inline]
    pub fn read(&self, pixel: &[u8]) -> (u8, u8, u8, u8) {
        (pixel[self.a], pixel[self.r], pixel[self.g], pixel[self.b])
    }
}

#[inline]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u8
}

/// Interpolate between two `0xRRGGBB` colours; `phase` 0 is `from`, 255 is `to`.
pub fn blend_rgb(from: u32, to: u32, phase: u8) -> u32 {
    let phase = phase as i32;
    let channel = |shift: u32| {
        let a = (from >> shift & 0xff) as i32;
        let b = (to >> shift & 0xff) as i32;
        ((a + (b - a) * phase / 255) as u32 & 0xff) << shift
    };

    channel(16) | channel(8) | channel(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_layouts() {
        let mut bgra = [0u8; 4];
        BufferFormat::Rgba8.encode(ChannelOrder::Bgra, 0x80112233, &mut bgra);
        assert_eq!(bgra, [0x33, 0x22, 0x11, 0x80]);

        let mut argb = [0u8; 4];
        BufferFormat::Rgba8.encode(ChannelOrder::Argb, 0x80112233, &mut argb);
        assert_eq!(argb, [0x80, 0x11, 0x22, 0x33]);

        assert_eq!(
            BufferFormat::Rgba8.decode(ChannelOrder::Bgra, &bgra),
            0x80112233
        );
        assert_eq!(
            BufferFormat::Rgba8.decode(ChannelOrder::Argb, &argb),
            0x80112233
        );
    }

    #[test]
    fn test_formats_without_alpha_decode_opaque() {
        let mut px = [0u8; 3];
        BufferFormat::Rgb8.encode(ChannelOrder::Bgra, 0x00ff8000, &mut px);
        assert_eq!(
            BufferFormat::Rgb8.decode(ChannelOrder::Bgra, &px),
            0xffff8000
        );

        let mut px = [0u8; 2];
        BufferFormat::Rgb565.encode(ChannelOrder::Bgra, 0xffffffff, &mut px);
        assert_eq!(
            BufferFormat::Rgb565.decode(ChannelOrder::Bgra, &px),
            0xffffffff
        );

        let mut px = [0u8; 1];
        BufferFormat::Grey8.encode(ChannelOrder::Bgra, 0xff000000, &mut px);
        assert_eq!(
            BufferFormat::Grey8.decode(ChannelOrder::Bgra, &px),
            0xff000000
        );
    }

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(BufferFormat::Grey8.bytes_per_pixel(), 1);
        assert_eq!(BufferFormat::Rgb565.bytes_per_pixel(), 2);
        assert_eq!(BufferFormat::Rgb8.bytes_per_pixel(), 3);
        assert_eq!(BufferFormat::Rgba8.bytes_per_pixel(), 4);
        assert!(BufferFormat::Rgba8.has_alpha());
        assert!(!BufferFormat::Rgb8.has_alpha());
    }

    #[test]
    fn test_blend_rgb_endpoints() {
        assert_eq!(blend_rgb(0x000000, 0xffffff, 0), 0x000000);
        assert_eq!(blend_rgb(0x000000, 0xffffff, 255), 0xffffff);
        assert_eq!(blend_rgb(0xff0000, 0x0000ff, 255), 0x0000ff);
    }
}
