use byteorder::{BigEndian, ByteOrder};

use crate::error::{BlastError, Result};

/// Lookup table of big-endian 16-bit entries used by the indexed variants.
///
/// Always exactly 128 or 256 entries; partial tables are rejected on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteTable {
    bytes: Vec<u8>,
}

impl PaletteTable {
    pub const SMALL_ENTRIES: usize = 128;
    pub const LARGE_ENTRIES: usize = 256;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() / 2 {
            Self::SMALL_ENTRIES | Self::LARGE_ENTRIES if bytes.len() % 2 == 0 => Ok(Self {
                bytes: bytes.to_vec(),
            }),
            _ => Err(BlastError::InvalidPaletteLength(bytes.len())),
        }
    }

    pub fn entries(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn get(&self, entry_index: usize) -> Result<u16> {
        self.lookup_byte(entry_index * 2)
    }

    /// Reads the entry starting at `byte_index`, as the decoder's address arithmetic does.
    pub fn lookup_byte(&self, byte_index: usize) -> Result<u16> {
        if byte_index + 1 >= self.bytes.len() {
            return Err(BlastError::IndexOutOfRange {
                index: byte_index,
                len: self.bytes.len(),
            });
        }
        Ok(BigEndian::read_u16(&self.bytes[byte_index..byte_index + 2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(entries: usize) -> Vec<u8> {
        (0..entries as u16).flat_map(|v| (v * 3).to_be_bytes()).collect()
    }

    #[test]
    fn accepts_only_full_tables() {
        assert_eq!(PaletteTable::from_bytes(&ramp(128)).unwrap().entries(), 128);
        assert_eq!(PaletteTable::from_bytes(&ramp(256)).unwrap().entries(), 256);
        assert_eq!(
            PaletteTable::from_bytes(&ramp(64)),
            Err(BlastError::InvalidPaletteLength(128))
        );
        assert_eq!(
            PaletteTable::from_bytes(&[0u8; 257]),
            Err(BlastError::InvalidPaletteLength(257))
        );
    }

    #[test]
    fn reads_big_endian_entries() {
        let palette = PaletteTable::from_bytes(&ramp(128)).unwrap();
        assert_eq!(palette.get(0), Ok(0));
        assert_eq!(palette.get(100), Ok(300));
        assert_eq!(palette.lookup_byte(2), Ok(3));
    }

    #[test]
    fn rejects_lookups_past_the_end() {
        let palette = PaletteTable::from_bytes(&ramp(128)).unwrap();
        assert_eq!(palette.get(127), Ok(381));
        assert_eq!(
            palette.get(128),
            Err(BlastError::IndexOutOfRange { index: 256, len: 256 })
        );
        assert_eq!(
            palette.lookup_byte(255),
            Err(BlastError::IndexOutOfRange { index: 255, len: 256 })
        );
    }
}
