use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blast;
use crate::error::BlastError;
use crate::texture::{PixelLayout, TexelFormat};

/// Blast compression scheme, identified by the tag stored next to each ROM entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum Variant {
    /// Uncompressed DMA copy.
    Raw = 0,
    Rgba16 = 1,
    Rgba32 = 2,
    Ia8 = 3,
    /// IA16 expanded through a 128-entry palette.
    Ia16 = 4,
    /// RGBA32 expanded through a 256-entry palette.
    Rgba32Indexed = 5,
    /// IA8 with 3-bit intensity and alpha fields.
    Ia8Alt = 6,
}

impl Variant {
    pub const ALL: [Variant; 7] = [
        Variant::Raw,
        Variant::Rgba16,
        Variant::Rgba32,
        Variant::Ia8,
        Variant::Ia16,
        Variant::Rgba32Indexed,
        Variant::Ia8Alt,
    ];

    pub fn from_tag(tag: u16) -> Result<Self, BlastError> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(BlastError::UnsupportedVariant(tag))
    }

    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Bytes produced per literal word, and per unit of back-reference length.
    pub fn element_size(self) -> usize {
        blast::codec(self).element_size
    }

    pub fn requires_palette(self) -> bool {
        self.palette_entries().is_some()
    }

    pub fn palette_entries(self) -> Option<usize> {
        match self {
            Variant::Ia16 => Some(128),
            Variant::Rgba32Indexed => Some(256),
            _ => None,
        }
    }

    pub fn is_grayscale(self) -> bool {
        matches!(self, Variant::Ia8 | Variant::Ia16 | Variant::Ia8Alt)
    }

    /// Bits per pixel of the decoded texels; zero for raw data.
    pub fn depth(self) -> u32 {
        match self {
            Variant::Raw => 0,
            Variant::Ia8 | Variant::Ia8Alt => 8,
            Variant::Rgba16 | Variant::Ia16 => 16,
            Variant::Rgba32 | Variant::Rgba32Indexed => 32,
        }
    }

    pub fn format_name(self) -> &'static str {
        match self {
            Variant::Raw => "",
            Variant::Rgba16 | Variant::Rgba32 | Variant::Rgba32Indexed => "rgba",
            Variant::Ia8 | Variant::Ia16 | Variant::Ia8Alt => "ia",
        }
    }

    /// Short format identifier such as `rgba16` or `ia8`.
    pub fn format_id(self) -> String {
        format!("{}{}", self.format_name(), self.depth())
    }

    /// File extension used when dumping decoded (but not unpacked) data.
    pub fn decoded_extension(self) -> String {
        match self {
            Variant::Raw => "unblast0".to_string(),
            other => other.format_id(),
        }
    }

    pub fn texel_format(self) -> Option<TexelFormat> {
        match self {
            Variant::Raw => None,
            Variant::Rgba16 => Some(TexelFormat::Rgba16),
            Variant::Rgba32 | Variant::Rgba32Indexed => Some(TexelFormat::Rgba32),
            Variant::Ia8 | Variant::Ia8Alt => Some(TexelFormat::Ia8),
            Variant::Ia16 => Some(TexelFormat::Ia16),
        }
    }

    pub fn output_layout(self) -> Option<PixelLayout> {
        self.texel_format().map(TexelFormat::layout)
    }

    fn name(self) -> &'static str {
        match self {
            Variant::Raw => "BLAST0",
            Variant::Rgba16 => "BLAST1_RGBA16",
            Variant::Rgba32 => "BLAST2_RGBA32",
            Variant::Ia8 => "BLAST3_IA8",
            Variant::Ia16 => "BLAST4_IA16",
            Variant::Rgba32Indexed => "BLAST5_RGBA32",
            Variant::Ia8Alt => "BLAST6_IA8",
        }
    }
}

impl TryFrom<u16> for Variant {
    type Error = BlastError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Variant::from_tag(value)
    }
}

impl From<Variant> for u16 {
    fn from(value: Variant) -> Self {
        value.tag()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_and_reject_unknown() {
        for variant in Variant::ALL {
            assert_eq!(Variant::from_tag(variant.tag()), Ok(variant));
        }
        assert_eq!(Variant::from_tag(7), Err(BlastError::UnsupportedVariant(7)));
    }

    #[test]
    fn attributes_match_asset_naming() {
        assert_eq!(Variant::Rgba16.format_id(), "rgba16");
        assert_eq!(Variant::Ia8Alt.format_id(), "ia8");
        assert_eq!(Variant::Ia16.format_id(), "ia16");
        assert_eq!(Variant::Raw.decoded_extension(), "unblast0");
        assert_eq!(Variant::Rgba32Indexed.decoded_extension(), "rgba32");
        assert_eq!(Variant::Rgba32Indexed.to_string(), "BLAST5_RGBA32");

        assert_eq!(Variant::Ia16.palette_entries(), Some(128));
        assert_eq!(Variant::Rgba32Indexed.palette_entries(), Some(256));
        assert!(!Variant::Rgba32.requires_palette());
        assert!(Variant::Ia16.is_grayscale());
        assert!(!Variant::Rgba16.is_grayscale());
    }

    #[test]
    fn element_sizes_follow_codec_table() {
        let sizes: Vec<usize> = Variant::ALL.iter().map(|v| v.element_size()).collect();
        assert_eq!(sizes, vec![2, 2, 4, 2, 4, 4, 2]);
    }

    #[test]
    fn deserializes_from_numeric_tag() {
        let variant: Variant = serde_json::from_str("5").unwrap();
        assert_eq!(variant, Variant::Rgba32Indexed);
        assert!(serde_json::from_str::<Variant>("9").is_err());
    }
}
