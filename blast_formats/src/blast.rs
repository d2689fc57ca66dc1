//! Blast texture decompression.
//!
//! Every variant except the raw one shares the same framing: a stream of
//! big-endian 16-bit words where a clear top bit marks a literal and a set top
//! bit marks a back-reference into the bytes decoded so far. Variants differ
//! only in how a literal expands and in which bits hold the back-reference
//! offset. The literal expansions are lifted from the game's decompression
//! routines and are bit-exact; the address of each routine is noted next to
//! its implementation.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};

use crate::error::{BlastError, Result};
use crate::palette::PaletteTable;
use crate::resolution::guess_resolution;
use crate::texture::{self, RasterImage};
use crate::variant::Variant;

const BACK_REFERENCE_FLAG: u16 = 0x8000;
const BACK_REFERENCE_LENGTH_MASK: u16 = 0x1F;
const RAW_CHUNK: usize = 8;

pub(crate) struct Codec {
    pub(crate) element_size: usize,
    offset_mask: u16,
    offset_shift: u32,
    literal: Literal,
}

enum Literal {
    Raw,
    Plain(fn(u16, &mut Vec<u8>)),
    Indexed(fn(u16, &PaletteTable, &mut Vec<u8>) -> Result<()>),
}

// Indexed by variant tag.
static CODECS: [Codec; 7] = [
    Codec {
        element_size: 2,
        offset_mask: 0,
        offset_shift: 0,
        literal: Literal::Raw,
    },
    Codec {
        element_size: 2,
        offset_mask: 0x7FFF,
        offset_shift: 5,
        literal: Literal::Plain(literal_rgba16),
    },
    Codec {
        element_size: 4,
        offset_mask: 0x7FE0,
        offset_shift: 4,
        literal: Literal::Plain(literal_rgba32),
    },
    Codec {
        element_size: 2,
        offset_mask: 0x7FFF,
        offset_shift: 5,
        literal: Literal::Plain(literal_ia8),
    },
    Codec {
        element_size: 4,
        offset_mask: 0x7FE0,
        offset_shift: 4,
        literal: Literal::Indexed(literal_ia16_indexed),
    },
    Codec {
        element_size: 4,
        offset_mask: 0x7FE0,
        offset_shift: 4,
        literal: Literal::Indexed(literal_rgba32_indexed),
    },
    Codec {
        element_size: 2,
        offset_mask: 0x7FFF,
        offset_shift: 5,
        literal: Literal::Plain(literal_ia8_alt),
    },
];

pub(crate) fn codec(variant: Variant) -> &'static Codec {
    &CODECS[variant.tag() as usize]
}

/// Compressed texture as handed over by the ROM loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlob {
    /// ROM address of the blob; used for identity and diagnostics only.
    pub address: u32,
    pub variant: Variant,
    pub data: Vec<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl EncodedBlob {
    pub fn new(address: u32, variant: Variant, data: Vec<u8>) -> Self {
        Self {
            address,
            variant,
            data,
            width: None,
            height: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Externally known dimensions, if both are present and non-zero.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
            _ => None,
        }
    }

    pub fn decode(&self, palette: Option<&PaletteTable>) -> Result<Vec<u8>> {
        let decoded = decode_blob(self.variant, &self.data, palette)?;
        debug!(
            "decoded {} at 0x{:06X}: {} -> {} bytes",
            self.variant,
            self.address,
            self.data.len(),
            decoded.len()
        );
        Ok(decoded)
    }

    /// Decodes and unpacks the blob, guessing dimensions when none are known.
    pub fn render(&self, palette: Option<&PaletteTable>) -> Result<RasterImage> {
        let decoded = self.decode(palette)?;
        let (width, height) = self
            .dimensions()
            .or_else(|| guess_resolution(self.variant, decoded.len()))
            .ok_or(BlastError::UnrenderableVariant(self.variant))?;
        let format = self
            .variant
            .texel_format()
            .ok_or(BlastError::UnrenderableVariant(self.variant))?;
        texture::unpack_texels(format, &decoded, width, height, format.render_flip())
    }
}

/// Decodes a variant that needs no palette.
pub fn decode(variant: Variant, encoded: &[u8]) -> Result<Vec<u8>> {
    decode_blob(variant, encoded, None)
}

/// Decodes with a palette; the palette is ignored by variants that do not index one.
pub fn decode_with_palette(
    variant: Variant,
    encoded: &[u8],
    palette: &PaletteTable,
) -> Result<Vec<u8>> {
    decode_blob(variant, encoded, Some(palette))
}

pub fn decode_blob(
    variant: Variant,
    encoded: &[u8],
    palette: Option<&PaletteTable>,
) -> Result<Vec<u8>> {
    if encoded.len() % 2 != 0 {
        return Err(BlastError::InvalidInputLength(encoded.len()));
    }

    let codec = codec(variant);
    match codec.literal {
        Literal::Raw => Ok(decode_raw(encoded)),
        Literal::Plain(literal) => expand(codec, encoded, |word, out| {
            literal(word, out);
            Ok(())
        }),
        Literal::Indexed(literal) => {
            let palette = palette.ok_or(BlastError::PaletteRequired(variant))?;
            if let Some(expected) = variant.palette_entries() {
                if palette.entries() != expected {
                    return Err(BlastError::PaletteSizeMismatch {
                        variant,
                        expected,
                        actual: palette.entries(),
                    });
                }
            }
            expand(codec, encoded, |word, out| literal(word, palette, out))
        }
    }
}

// The loader DMAs raw blobs in 8-byte units, so a trailing partial chunk never
// arrives and reads back as zeroes.
fn decode_raw(encoded: &[u8]) -> Vec<u8> {
    let whole = encoded.len() / RAW_CHUNK * RAW_CHUNK;
    let mut out = Vec::with_capacity(encoded.len());
    out.extend_from_slice(&encoded[..whole]);
    out.resize(encoded.len(), 0);
    out
}

fn expand<F>(codec: &Codec, encoded: &[u8], mut literal: F) -> Result<Vec<u8>>
where
    F: FnMut(u16, &mut Vec<u8>) -> Result<()>,
{
    let mut out = Vec::with_capacity(encoded.len() * 2);
    for (word_index, chunk) in encoded.chunks_exact(2).enumerate() {
        let word = BigEndian::read_u16(chunk);
        if word & BACK_REFERENCE_FLAG == 0 {
            literal(word, &mut out)?;
            continue;
        }

        let (length, offset) = split_back_reference(codec, word);
        copy_back_reference(&mut out, word_index, offset, length * codec.element_size)?;
    }
    Ok(out)
}

fn split_back_reference(codec: &Codec, word: u16) -> (usize, usize) {
    let length = (word & BACK_REFERENCE_LENGTH_MASK) as usize;
    let offset = ((word & codec.offset_mask) >> codec.offset_shift) as usize;
    (length, offset)
}

// Copies byte by byte so that a source range overlapping the bytes being
// appended repeats the pattern, as an LZ77 window copy does.
fn copy_back_reference(
    out: &mut Vec<u8>,
    word_index: usize,
    offset: usize,
    count: usize,
) -> Result<()> {
    if offset > out.len() {
        return Err(BlastError::CorruptBackReference {
            word: word_index,
            offset,
            available: out.len(),
        });
    }
    if offset == 0 {
        if count > 0 {
            warn!("back-reference at word {word_index} has zero offset; {count} bytes skipped");
        }
        return Ok(());
    }

    let start = out.len() - offset;
    out.reserve(count);
    for index in start..start + count {
        let value = out[index];
        out.push(value);
    }
    Ok(())
}

// 802A5AE0
fn literal_rgba16(word: u16, out: &mut Vec<u8>) {
    let high = (word & 0xFFC0) << 1;
    let value = (word & 0x3F) | high;
    out.extend_from_slice(&value.to_be_bytes());
}

// 802A5B90
fn literal_rgba32(word: u16, out: &mut Vec<u8>) {
    let word = u32::from(word);
    let mut value = (word & 0x7800) << 0x11;
    value |= (word & 0x0780) << 0xD;
    value |= (word & 0x0078) << 0x9;
    value |= (word & 0x0007) << 0x5;
    out.extend_from_slice(&value.to_be_bytes());
}

// 802A5A2C
fn literal_ia8(word: u16, out: &mut Vec<u8>) {
    let high = ((word >> 8) << 1) as u8;
    let low = ((word & 0xFF) << 1) as u8;
    out.extend_from_slice(&[high, low]);
}

// 802A5958
fn literal_ia8_alt(word: u16, out: &mut Vec<u8>) {
    let [high, low] = word.to_be_bytes();
    out.extend_from_slice(&[expand_ia8_alt(high), expand_ia8_alt(low)]);
}

fn expand_ia8_alt(byte: u8) -> u8 {
    let intensity = (byte & 0x38) << 2;
    ((byte & 0x07) << 1) | intensity
}

// 802A5C5C
fn literal_ia16_indexed(word: u16, palette: &PaletteTable, out: &mut Vec<u8>) -> Result<()> {
    for byte in word.to_be_bytes() {
        let entry = palette.lookup_byte(usize::from(byte & 0xFE))?;
        let value = (entry << 1) | u16::from(byte & 1);
        out.extend_from_slice(&value.to_be_bytes());
    }
    Ok(())
}

// 802A5D34
fn literal_rgba32_indexed(word: u16, palette: &PaletteTable, out: &mut Vec<u8>) -> Result<()> {
    let entry = u32::from(palette.lookup_byte(usize::from(word >> 4) << 1)?);
    let alpha = u32::from(word & 0xF) << 4;
    let mut value = (entry & 0x7C00) << 0x11;
    value |= (entry & 0x03E0) << 0xE;
    value |= (entry & 0x001F) << 0xB;
    value |= alpha;
    out.extend_from_slice(&value.to_be_bytes());
    Ok(())
}

/// One word of an encoded stream, classified by the variant's framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Literal(u16),
    BackReference { length: usize, offset: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub words: usize,
    pub literals: usize,
    pub back_references: usize,
    /// Bytes produced by back-references.
    pub copied_bytes: usize,
    /// Length the decoder will produce for this stream.
    pub decoded_len: usize,
}

/// Classifies every word of `encoded` without expanding it.
///
/// Raw blobs carry no framing; their words are all reported as literals.
pub fn inspect(variant: Variant, encoded: &[u8]) -> Result<Vec<Token>> {
    if encoded.len() % 2 != 0 {
        return Err(BlastError::InvalidInputLength(encoded.len()));
    }
    let codec = codec(variant);
    let tokens = encoded
        .chunks_exact(2)
        .map(|chunk| {
            let word = BigEndian::read_u16(chunk);
            if matches!(codec.literal, Literal::Raw) || word & BACK_REFERENCE_FLAG == 0 {
                Token::Literal(word)
            } else {
                let (length, offset) = split_back_reference(codec, word);
                Token::BackReference { length, offset }
            }
        })
        .collect();
    Ok(tokens)
}

pub fn stream_stats(variant: Variant, tokens: &[Token]) -> StreamStats {
    let element_size = variant.element_size();
    let mut stats = StreamStats {
        words: tokens.len(),
        ..StreamStats::default()
    };
    for token in tokens {
        match *token {
            Token::Literal(_) => {
                stats.literals += 1;
                stats.decoded_len += element_size;
            }
            Token::BackReference { length, offset } => {
                stats.back_references += 1;
                if offset > 0 {
                    stats.copied_bytes += length * element_size;
                    stats.decoded_len += length * element_size;
                }
            }
        }
    }
    if variant == Variant::Raw {
        stats.decoded_len = tokens.len() * 2;
    }
    stats
}
