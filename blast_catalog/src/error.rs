use blast_formats::{BlastError, Variant};
use thiserror::Error;

/// Errors raised by catalog lookups and decodes. Decode failures carry the
/// blob's address and variant so a batch can report and skip the asset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{variant} at 0x{address:06X}: {source}")]
    Decode {
        address: u32,
        variant: Variant,
        #[source]
        source: BlastError,
    },
    #[error("composite {name}: {source}")]
    Compose {
        name: String,
        #[source]
        source: BlastError,
    },
    #[error("no blob at 0x{0:06X}")]
    UnknownBlob(u32),
    #[error("no palette at 0x{0:06X}")]
    UnknownPalette(u32),
    #[error("0x{address:06X} needs a {entries}-entry palette but none is loaded")]
    NoPaletteSelected { address: u32, entries: usize },
    #[error("0x{0:06X} does not use a palette")]
    PaletteNotUsed(u32),
    #[error("palette 0x{palette:06X} has {actual} entries; 0x{address:06X} needs {expected}")]
    WrongPaletteSize {
        address: u32,
        palette: u32,
        expected: usize,
        actual: usize,
    },
    #[error("unknown animation {0}")]
    UnknownAnimation(String),
    #[error("animation {0} has no frames")]
    EmptyAnimation(String),
    #[error("blobs in 0x{start:06X}..=0x{end:06X} mix {first} and {other}")]
    MixedVariants {
        start: u32,
        end: u32,
        first: Variant,
        other: Variant,
    },
}
