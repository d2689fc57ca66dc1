//! Dimension guesses for textures whose size is not recorded anywhere.
//!
//! The decoded length alone does not determine width and height. The tables
//! below list the sizes seen across the game's assets; anything else falls back
//! to a fixed width. Externally supplied dimensions always win over these.

use log::warn;

use crate::variant::Variant;

const FALLBACK_WIDTH: u32 = 32;
const IA8_ALT_WIDTH: u32 = 16;

const RGBA16_SIZES: &[(usize, (u32, u32))] = &[
    (16, (4, 2)),
    (512, (16, 16)),
    (1024, (16, 32)),
    (2048, (32, 32)),
    (3200, (40, 40)),
    (4096, (64, 32)),
    (8192, (64, 64)),
];

const RGBA32_SIZES: &[(usize, (u32, u32))] = &[
    (256, (8, 8)),
    (512, (8, 16)),
    (1024, (16, 16)),
    (2048, (16, 32)),
    (4096, (32, 32)),
    (8192, (64, 32)),
];

const IA8_SIZES: &[(usize, (u32, u32))] = &[
    (1024, (32, 32)),
    (2048, (32, 64)),
    (4096, (64, 64)),
];

const IA16_SIZES: &[(usize, (u32, u32))] = &[
    (1024, (16, 32)),
    (2048, (32, 32)),
    (4096, (32, 64)),
    (8192, (64, 64)),
];

const RGBA32_INDEXED_SIZES: &[(usize, (u32, u32))] = &[
    (1024, (16, 16)),
    (2048, (32, 16)),
    (4096, (32, 32)),
    (8192, (64, 32)),
];

/// Guesses `(width, height)` for `decoded_len` bytes of `variant` output.
///
/// Returns `None` for raw blobs, which have no pixel size to divide by.
pub fn guess_resolution(variant: Variant, decoded_len: usize) -> Option<(u32, u32)> {
    let (known, bytes_per_pixel): (&[(usize, (u32, u32))], usize) = match variant {
        Variant::Raw => return None,
        Variant::Rgba16 => (RGBA16_SIZES, 2),
        Variant::Rgba32 => (RGBA32_SIZES, 4),
        Variant::Ia8 => (IA8_SIZES, 1),
        Variant::Ia16 => (IA16_SIZES, 2),
        Variant::Rgba32Indexed => (RGBA32_INDEXED_SIZES, 4),
        Variant::Ia8Alt => {
            return Some((IA8_ALT_WIDTH, (decoded_len / IA8_ALT_WIDTH as usize) as u32));
        }
    };

    if let Some(&(_, dims)) = known.iter().find(|(len, _)| *len == decoded_len) {
        return Some(dims);
    }

    let height = decoded_len / (FALLBACK_WIDTH as usize * bytes_per_pixel);
    warn!(
        "no known {variant} size for {decoded_len} bytes; guessing {FALLBACK_WIDTH}x{height}"
    );
    Some((FALLBACK_WIDTH, height as u32))
}
