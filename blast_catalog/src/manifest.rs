//! JSON manifest describing where blobs and palettes live in a source image.
//!
//! ```json
//! {
//!   "source": "rom.z64",
//!   "blobs": [{ "address": "0x00DB08", "variant": 1, "offset": 56072, "size": 1210 }],
//!   "palettes": [{ "address": "0x0CB000", "offset": 831488, "entries": 256 }],
//!   "composites": [{ "name": "sign", "layout": "TB", "addresses": ["0x00DB08", "0x00DC00"] }],
//!   "animations": [{ "name": "water", "addresses": ["0x01A000", "0x01A400"] }],
//!   "frame_interval_ms": 100
//! }
//! ```
//!
//! Relative source paths resolve against the manifest's directory first.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, ensure};
use blast_formats::{CompositeLayout, EncodedBlob, PaletteTable, Variant};
use log::{debug, info};
use memmap2::{Mmap, MmapOptions};
use serde::Deserialize;

use crate::animation::{Animation, Composite};
use crate::catalog::{Catalog, DEFAULT_FRAME_INTERVAL};

/// A ROM address, written in manifests either as a number or as a hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "AddressRepr")]
pub struct Address(pub u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressRepr {
    Number(u32),
    Text(String),
}

impl TryFrom<AddressRepr> for Address {
    type Error = String;

    fn try_from(repr: AddressRepr) -> Result<Self, Self::Error> {
        match repr {
            AddressRepr::Number(value) => Ok(Address(value)),
            AddressRepr::Text(text) => parse_address(&text).map(Address),
        }
    }
}

/// Parses `0x00DB08`, `00DB08` or `DB08` as hexadecimal.
pub fn parse_address(text: &str) -> Result<u32, String> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16).map_err(|err| format!("invalid address '{text}': {err}"))
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub source: PathBuf,
    #[serde(default)]
    pub blobs: Vec<BlobRecord>,
    #[serde(default)]
    pub palettes: Vec<PaletteRecord>,
    #[serde(default)]
    pub composites: Vec<CompositeRecord>,
    #[serde(default)]
    pub animations: Vec<AnimationRecord>,
    #[serde(default)]
    pub composite_animations: Vec<CompositeAnimationRecord>,
    #[serde(default)]
    pub default_palettes: DefaultPalettes,
    #[serde(default)]
    pub frame_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct BlobRecord {
    pub address: Address,
    pub variant: Variant,
    pub offset: u64,
    pub size: usize,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PaletteRecord {
    pub address: Address,
    pub offset: u64,
    pub entries: usize,
}

#[derive(Debug, Deserialize)]
pub struct CompositeRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub layout: CompositeLayout,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Deserialize)]
pub struct AnimationRecord {
    pub name: String,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Deserialize)]
pub struct CompositeAnimationRecord {
    pub name: String,
    pub layout: CompositeLayout,
    pub frames: Vec<Vec<Address>>,
}

/// Palette to fall back on per table size when a blob has no selection.
#[derive(Debug, Default, Deserialize)]
pub struct DefaultPalettes {
    #[serde(default)]
    pub small: Option<Address>,
    #[serde(default)]
    pub large: Option<Address>,
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data =
            fs::read(path).with_context(|| format!("reading manifest {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("parsing manifest {}", path.display()))
    }
}

/// Reads a manifest and builds a catalog from the source image it names.
pub fn load_catalog(manifest_path: &Path) -> Result<Catalog> {
    let manifest = Manifest::from_path(manifest_path)?;
    let source_path = resolve_source_path(manifest_path, &manifest.source);
    let source = map_source(&source_path)?;
    let catalog = build_catalog(&manifest, &source)
        .with_context(|| format!("building catalog from {}", manifest_path.display()))?;
    info!(
        "loaded {} blobs and {} palettes from {}",
        manifest.blobs.len(),
        manifest.palettes.len(),
        source_path.display()
    );
    Ok(catalog)
}

pub fn build_catalog(manifest: &Manifest, source: &[u8]) -> Result<Catalog> {
    let mut catalog = Catalog::new();

    for record in &manifest.blobs {
        let address = record.address.0;
        let data = source_slice(source, record.offset, record.size)
            .with_context(|| format!("blob 0x{address:06X}"))?;
        let mut blob = EncodedBlob::new(address, record.variant, data.to_vec());
        blob.width = record.width;
        blob.height = record.height;
        debug!("blob 0x{address:06X}: {} ({} bytes)", record.variant, record.size);
        catalog.insert_blob(blob);
    }

    for record in &manifest.palettes {
        let address = record.address.0;
        ensure!(
            record.entries == PaletteTable::SMALL_ENTRIES
                || record.entries == PaletteTable::LARGE_ENTRIES,
            "palette 0x{address:06X} has {} entries; expected {} or {}",
            record.entries,
            PaletteTable::SMALL_ENTRIES,
            PaletteTable::LARGE_ENTRIES
        );
        let bytes = source_slice(source, record.offset, record.entries * 2)
            .with_context(|| format!("palette 0x{address:06X}"))?;
        catalog.insert_palette(address, PaletteTable::from_bytes(bytes)?);
    }

    let defaults = [
        (manifest.default_palettes.small, PaletteTable::SMALL_ENTRIES),
        (manifest.default_palettes.large, PaletteTable::LARGE_ENTRIES),
    ];
    for (address, entries) in defaults {
        let Some(Address(address)) = address else {
            continue;
        };
        let palette = catalog
            .palette(address)
            .ok_or_else(|| anyhow!("default palette 0x{address:06X} is not listed"))?;
        ensure!(
            palette.entries() == entries,
            "default palette 0x{address:06X} has {} entries; expected {entries}",
            palette.entries()
        );
        catalog.set_default_palette(address)?;
    }

    for record in &manifest.composites {
        let mut composite = Composite::new(record.layout, addresses(&record.addresses));
        composite.name = record.name.clone();
        catalog.add_composite(composite)?;
    }

    for record in &manifest.animations {
        catalog.add_animation(Animation::tiles(&record.name, addresses(&record.addresses)))?;
    }

    for record in &manifest.composite_animations {
        let frames = record
            .frames
            .iter()
            .map(|frame| Composite::new(record.layout, addresses(frame)))
            .collect();
        catalog.add_animation(Animation::composites(&record.name, frames))?;
    }

    let interval = manifest
        .frame_interval_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_FRAME_INTERVAL);
    catalog.set_frame_interval(interval);

    Ok(catalog)
}

fn addresses(list: &[Address]) -> Vec<u32> {
    list.iter().map(|address| address.0).collect()
}

fn resolve_source_path(manifest_path: &Path, source: &Path) -> PathBuf {
    if source.is_absolute() {
        return source.to_path_buf();
    }

    let from_manifest = manifest_path
        .parent()
        .map(|parent| parent.join(source))
        .unwrap_or_else(|| source.to_path_buf());
    if from_manifest.exists() || !source.exists() {
        return from_manifest;
    }
    source.to_path_buf()
}

fn map_source(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    // The source image is only read, and the mapping is dropped once the
    // catalog has copied the slices it needs.
    unsafe { MmapOptions::new().map(&file) }
        .with_context(|| format!("memory-mapping {}", path.display()))
}

fn source_slice(source: &[u8], offset: u64, size: usize) -> Result<&[u8]> {
    let start = usize::try_from(offset).context("offset does not fit in memory")?;
    let end = start
        .checked_add(size)
        .ok_or_else(|| anyhow!("range 0x{start:X}+{size} overflows"))?;
    ensure!(
        end <= source.len(),
        "range 0x{start:X}..0x{end:X} runs past end of source ({} bytes)",
        source.len()
    );
    Ok(&source[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_accept_numbers_and_hex() {
        let parsed: Vec<Address> =
            serde_json::from_str(r#"[56072, "0x00DB08", "00db08", "DB08"]"#).unwrap();
        assert!(parsed.iter().all(|address| address.0 == 0xDB08));
        assert!(serde_json::from_str::<Address>(r#""0xZZ""#).is_err());
    }

    #[test]
    fn slices_are_bounds_checked() {
        let source = [1u8, 2, 3, 4];
        assert_eq!(source_slice(&source, 1, 2).unwrap(), &[2, 3]);
        assert!(source_slice(&source, 3, 2).is_err());
        assert!(source_slice(&source, u64::MAX, 1).is_err());
    }

    #[test]
    fn manifest_defaults() {
        let manifest: Manifest = serde_json::from_str(r#"{ "source": "rom.bin" }"#).unwrap();
        assert!(manifest.blobs.is_empty());
        assert!(manifest.default_palettes.large.is_none());
        let catalog = build_catalog(&manifest, &[]).unwrap();
        assert_eq!(catalog.frame_interval(), DEFAULT_FRAME_INTERVAL);
    }

    #[test]
    fn unknown_variant_tags_are_rejected() {
        let err = serde_json::from_str::<BlobRecord>(
            r#"{ "address": 1, "variant": 9, "offset": 0, "size": 2 }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains('9'), "{err}");
    }
}
