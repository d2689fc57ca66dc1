use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::error::{BlastError, Result};
use crate::variant::Variant;

/// Pixel layout of an unpacked raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelLayout {
    Rgba8888,
    /// 8-bit intensity followed by 8-bit alpha.
    GrayAlpha8,
    /// Decoded IA16 texels, left big-endian.
    GrayAlpha16,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgba8888 => 4,
            PixelLayout::GrayAlpha8 | PixelLayout::GrayAlpha16 => 2,
        }
    }
}

/// Texel encodings the unpacker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    /// RRRRRGGG GGBBBBBA
    Rgba16,
    Rgba32,
    /// Two texels per byte, IIIA per nibble.
    Ia4,
    /// IIIIAAAA
    Ia8,
    Ia16,
}

impl TexelFormat {
    pub fn layout(self) -> PixelLayout {
        match self {
            TexelFormat::Rgba16 | TexelFormat::Rgba32 => PixelLayout::Rgba8888,
            TexelFormat::Ia4 | TexelFormat::Ia8 => PixelLayout::GrayAlpha8,
            TexelFormat::Ia16 => PixelLayout::GrayAlpha16,
        }
    }

    /// Bytes of one source row.
    pub fn row_len(self, width: u32) -> usize {
        let width = width as usize;
        match self {
            TexelFormat::Ia4 => width.div_ceil(2),
            TexelFormat::Ia8 => width,
            TexelFormat::Rgba16 | TexelFormat::Ia16 => width * 2,
            TexelFormat::Rgba32 => width * 4,
        }
    }

    /// Formats copied to the raster unchanged.
    pub fn is_passthrough(self) -> bool {
        matches!(self, TexelFormat::Rgba32 | TexelFormat::Ia16)
    }

    /// Flip applied when rendering a blob: converted formats are stored
    /// bottom-up, passthrough formats are already in raster order.
    pub fn render_flip(self) -> Flip {
        if self.is_passthrough() {
            Flip::NONE
        } else {
            Flip::VERTICAL
        }
    }

    pub fn source_len(self, width: u32, height: u32) -> usize {
        self.row_len(width) * height as usize
    }
}

/// Scan-order reversal applied while unpacking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Flip {
    pub const NONE: Flip = Flip {
        horizontal: false,
        vertical: false,
    };

    /// Textures are stored bottom row first.
    pub const VERTICAL: Flip = Flip {
        horizontal: false,
        vertical: true,
    };
}

/// Unpacked pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    layout: PixelLayout,
    pixels: Vec<u8>,
}

impl RasterImage {
    pub fn from_pixels(
        width: u32,
        height: u32,
        layout: PixelLayout,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        let required = width as usize * height as usize * layout.bytes_per_pixel();
        if pixels.len() != required {
            return Err(BlastError::BufferTooSmall {
                width,
                height,
                required,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            pixels,
        })
    }

    pub(crate) fn blank(width: u32, height: u32, layout: PixelLayout) -> Self {
        let len = width as usize * height as usize * layout.bytes_per_pixel();
        Self {
            width,
            height,
            layout,
            pixels: vec![0u8; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.stride();
        let start = y as usize * stride;
        Some(&self.pixels[start..start + stride])
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width {
            return None;
        }
        let bpp = self.layout.bytes_per_pixel();
        let start = x as usize * bpp;
        self.row(y).map(|row| &row[start..start + bpp])
    }

    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.pixels[start..start + stride]
    }
}

/// Unpacks the decoded output of `variant` into a raster.
pub fn unpack(
    variant: Variant,
    decoded: &[u8],
    width: u32,
    height: u32,
    flip: Flip,
) -> Result<RasterImage> {
    let format = variant
        .texel_format()
        .ok_or(BlastError::UnrenderableVariant(variant))?;
    unpack_texels(format, decoded, width, height, flip)
}

pub fn unpack_texels(
    format: TexelFormat,
    decoded: &[u8],
    width: u32,
    height: u32,
    flip: Flip,
) -> Result<RasterImage> {
    let required = format.source_len(width, height);
    if decoded.len() < required {
        return Err(BlastError::BufferTooSmall {
            width,
            height,
            required,
            actual: decoded.len(),
        });
    }

    let layout = format.layout();
    let row_len = format.row_len(width);
    let mut pixels =
        Vec::with_capacity(width as usize * height as usize * layout.bytes_per_pixel());

    for y in 0..height {
        let src_y = if flip.vertical { height - 1 - y } else { y };
        let row = &decoded[src_y as usize * row_len..(src_y as usize + 1) * row_len];
        for x in 0..width {
            let src_x = (if flip.horizontal { width - 1 - x } else { x }) as usize;
            push_texel(format, row, src_x, &mut pixels);
        }
    }

    Ok(RasterImage {
        width,
        height,
        layout,
        pixels,
    })
}

fn push_texel(format: TexelFormat, row: &[u8], x: usize, out: &mut Vec<u8>) {
    match format {
        TexelFormat::Rgba16 => {
            let value = BigEndian::read_u16(&row[x * 2..x * 2 + 2]);
            out.extend_from_slice(&rgba_from_5551(value));
        }
        TexelFormat::Rgba32 => out.extend_from_slice(&row[x * 4..x * 4 + 4]),
        TexelFormat::Ia8 => {
            let byte = row[x];
            out.push(scale_channel(byte >> 4, 15));
            out.push(scale_channel(byte & 0x0F, 15));
        }
        TexelFormat::Ia4 => {
            let byte = row[x / 2];
            let nibble = if x % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            out.push(scale_channel(nibble >> 1, 7));
            out.push((nibble & 1) * 0xFF);
        }
        TexelFormat::Ia16 => out.extend_from_slice(&row[x * 2..x * 2 + 2]),
    }
}

fn rgba_from_5551(value: u16) -> [u8; 4] {
    let r = ((value >> 11) & 0x1F) as u8;
    let g = ((value >> 6) & 0x1F) as u8;
    let b = ((value >> 1) & 0x1F) as u8;
    let a = (value & 1) as u8 * 0xFF;
    [
        scale_channel(r, 31),
        scale_channel(g, 31),
        scale_channel(b, 31),
        a,
    ]
}

/// `ceil(255 * value / max)`, which the asset exports depend on (1/31 -> 9, not 8).
fn scale_channel(value: u8, max: u32) -> u8 {
    ((0xFF * u32::from(value) + max - 1) / max) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blast;

    #[test]
    fn rgba16_extremes() {
        let white = unpack_texels(TexelFormat::Rgba16, &[0xFF, 0xFF], 1, 1, Flip::NONE).unwrap();
        assert_eq!(white.pixels(), &[255, 255, 255, 255]);
        let clear = unpack_texels(TexelFormat::Rgba16, &[0x00, 0x00], 1, 1, Flip::NONE).unwrap();
        assert_eq!(clear.pixels(), &[0, 0, 0, 0]);
    }

    #[test]
    fn rgba16_scales_with_ceiling() {
        // r = 1, g = 2, b = 30, opaque
        let value: u16 = (1 << 11) | (2 << 6) | (30 << 1) | 1;
        let image =
            unpack_texels(TexelFormat::Rgba16, &value.to_be_bytes(), 1, 1, Flip::NONE).unwrap();
        assert_eq!(image.pixels(), &[9, 17, 247, 255]);
    }

    #[test]
    fn ia8_nibbles() {
        let image =
            unpack_texels(TexelFormat::Ia8, &[0xF0, 0x0F, 0x00], 3, 1, Flip::NONE).unwrap();
        assert_eq!(image.layout(), PixelLayout::GrayAlpha8);
        assert_eq!(image.pixels(), &[255, 0, 0, 255, 0, 0]);
    }

    #[test]
    fn ia4_packs_two_texels_per_byte() {
        let image = unpack_texels(TexelFormat::Ia4, &[0xF1, 0x20], 4, 1, Flip::NONE).unwrap();
        assert_eq!(image.pixels(), &[255, 255, 0, 255, 37, 0, 0, 0]);
    }

    #[test]
    fn ia4_odd_width_pads_rows() {
        // 3 texels use 2 bytes per row; the last nibble of each row is padding
        let image =
            unpack_texels(TexelFormat::Ia4, &[0xC0, 0x0F, 0x10, 0xF0], 3, 2, Flip::NONE).unwrap();
        assert_eq!(image.row(0).unwrap(), &[219, 0, 0, 0, 0, 0]);
        assert_eq!(image.row(1).unwrap(), &[0, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn vertical_flip_reverses_rows_only() {
        let data = [0x00, 0x0F, 0xF0, 0xFF];
        let image = unpack_texels(TexelFormat::Ia8, &data, 2, 2, Flip::VERTICAL).unwrap();
        assert_eq!(image.row(0).unwrap(), &[255, 0, 255, 255]);
        assert_eq!(image.row(1).unwrap(), &[0, 0, 0, 255]);
    }

    #[test]
    fn horizontal_flip_reverses_columns() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let flip = Flip {
            horizontal: true,
            vertical: false,
        };
        let image = unpack_texels(TexelFormat::Rgba32, &data, 2, 1, flip).unwrap();
        assert_eq!(image.pixels(), &[5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn explicit_flip_applies_to_passthrough_formats() {
        let data = [0xAA, 0xBB, 0xCC, 0xDD];
        let image = unpack_texels(TexelFormat::Ia16, &data, 1, 2, Flip::VERTICAL).unwrap();
        assert_eq!(image.layout(), PixelLayout::GrayAlpha16);
        assert_eq!(image.pixels(), &[0xCC, 0xDD, 0xAA, 0xBB]);

        let straight = unpack_texels(TexelFormat::Rgba32, &[9; 8], 2, 1, Flip::NONE).unwrap();
        assert_eq!(straight.pixels(), &[9; 8]);
    }

    #[test]
    fn render_flip_skips_passthrough_formats() {
        assert_eq!(TexelFormat::Rgba32.render_flip(), Flip::NONE);
        assert_eq!(TexelFormat::Ia16.render_flip(), Flip::NONE);
        assert_eq!(TexelFormat::Rgba16.render_flip(), Flip::VERTICAL);
        assert_eq!(TexelFormat::Ia8.render_flip(), Flip::VERTICAL);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert_eq!(
            unpack_texels(TexelFormat::Rgba16, &[0; 6], 2, 2, Flip::NONE),
            Err(BlastError::BufferTooSmall {
                width: 2,
                height: 2,
                required: 8,
                actual: 6
            })
        );
    }

    #[test]
    fn raw_variant_has_no_layout() {
        assert_eq!(
            unpack(Variant::Raw, &[0; 8], 2, 2, Flip::NONE),
            Err(BlastError::UnrenderableVariant(Variant::Raw))
        );
    }

    #[test]
    fn pixel_accessor_bounds() {
        let image = unpack_texels(TexelFormat::Ia8, &[0xF0, 0x0F], 2, 1, Flip::NONE).unwrap();
        assert_eq!(image.pixel(1, 0), Some(&[0, 255][..]));
        assert_eq!(image.pixel(2, 0), None);
        assert_eq!(image.pixel(0, 1), None);
    }

    #[test]
    fn ia8_blob_decodes_end_to_end() {
        let decoded = blast::decode(Variant::Ia8, &[0x01, 0x01]).unwrap();
        assert_eq!(decoded, vec![0x02, 0x02]);
        let image = unpack(Variant::Ia8, &decoded, 1, 2, Flip::NONE).unwrap();
        assert_eq!(image.width(), 1);
        assert_eq!(image.height(), 2);
        assert_eq!(image.pixels(), &[0, 34, 0, 34]);
    }

    #[test]
    fn from_pixels_checks_length() {
        assert!(RasterImage::from_pixels(2, 2, PixelLayout::GrayAlpha8, vec![0; 8]).is_ok());
        assert_eq!(
            RasterImage::from_pixels(2, 2, PixelLayout::Rgba8888, vec![0; 8]),
            Err(BlastError::BufferTooSmall {
                width: 2,
                height: 2,
                required: 16,
                actual: 8
            })
        );
    }
}
