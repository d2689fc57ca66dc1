use thiserror::Error;

use crate::composite::CompositeLayout;
use crate::variant::Variant;

/// Failure conditions raised while decoding, unpacking or compositing a texture.
///
/// Every variant is local to the asset being processed; callers are expected to
/// report it and move on to the next asset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlastError {
    #[error("encoded length {0} is not a whole number of 16-bit words")]
    InvalidInputLength(usize),
    #[error(
        "back-reference at word {word} reaches {offset} bytes back but only {available} bytes are decoded"
    )]
    CorruptBackReference {
        word: usize,
        offset: usize,
        available: usize,
    },
    #[error("{0} requires a palette")]
    PaletteRequired(Variant),
    #[error("index {index} out of range for {len}-byte buffer")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("decoded buffer holds {actual} bytes but {width}x{height} needs {required}")]
    BufferTooSmall {
        width: u32,
        height: u32,
        required: usize,
        actual: usize,
    },
    #[error("tile {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    TileSizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("{layout:?} composite needs {expected} tiles, got {actual}")]
    TileCountMismatch {
        layout: CompositeLayout,
        expected: usize,
        actual: usize,
    },
    #[error("tile {index} pixel layout differs from tile 0")]
    TileLayoutMismatch { index: usize },
    #[error("variant tag {0} is not in 0..=6")]
    UnsupportedVariant(u16),
    #[error("{0} carries raw data without a pixel layout")]
    UnrenderableVariant(Variant),
    #[error("palette blob is {0} bytes; expected 256 or 512")]
    InvalidPaletteLength(usize),
    #[error("{variant} needs a {expected}-entry palette, got {actual} entries")]
    PaletteSizeMismatch {
        variant: Variant,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T, E = BlastError> = std::result::Result<T, E>;
