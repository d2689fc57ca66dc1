use log::warn;
use serde::Serialize;

use crate::animation::{Animation, AnimationFrames, Composite};
use crate::catalog::{Catalog, Result};
use crate::error::CatalogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Composite,
    Animation,
    CompositeAnimation,
}

/// One line of the catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub address: String,
    pub name: Option<String>,
    pub variant: String,
    pub format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub encoded_size: usize,
    pub decoded_size: usize,
    pub kind: AssetKind,
    pub frames: usize,
}

pub fn format_address(address: u32) -> String {
    format!("0x{address:06X}")
}

pub fn blob_row(catalog: &Catalog, address: u32) -> Result<SummaryRow> {
    let blob = catalog.blob(address).ok_or(CatalogError::UnknownBlob(address))?;
    let dimensions = catalog.dimensions(address)?;
    Ok(SummaryRow {
        address: format_address(address),
        name: None,
        variant: blob.variant.to_string(),
        format: blob.variant.format_id(),
        width: dimensions.map(|(width, _)| width),
        height: dimensions.map(|(_, height)| height),
        encoded_size: blob.data.len(),
        decoded_size: catalog.decoded_len(address)?,
        kind: AssetKind::Image,
        frames: 1,
    })
}

/// Sizes are summed over tiles; dimensions are the canvas size.
pub fn composite_row(catalog: &Catalog, composite: &Composite) -> Result<SummaryRow> {
    let first = composite_first(composite)?;
    let mut row = blob_row(catalog, first)?;
    let (encoded_size, decoded_size) = sum_sizes(catalog, &composite.addresses)?;
    if let (Some(width), Some(height)) = (row.width, row.height) {
        let (width, height) = composite.layout.canvas_size(width, height);
        row.width = Some(width);
        row.height = Some(height);
    }
    row.name = composite.name.clone();
    row.encoded_size = encoded_size;
    row.decoded_size = decoded_size;
    row.kind = AssetKind::Composite;
    Ok(row)
}

pub fn animation_row(catalog: &Catalog, animation: &Animation) -> Result<SummaryRow> {
    let mut row = match &animation.frames {
        AnimationFrames::Tiles(addresses) => {
            let first = addresses
                .first()
                .copied()
                .ok_or_else(|| CatalogError::EmptyAnimation(animation.name.clone()))?;
            let mut row = blob_row(catalog, first)?;
            row.kind = AssetKind::Animation;
            row
        }
        AnimationFrames::Composites(frames) => {
            let first = frames
                .first()
                .ok_or_else(|| CatalogError::EmptyAnimation(animation.name.clone()))?;
            let mut row = composite_row(catalog, first)?;
            row.kind = AssetKind::CompositeAnimation;
            row
        }
    };
    let (encoded_size, decoded_size) = sum_sizes(catalog, &animation.addresses())?;
    row.name = Some(animation.name.clone());
    row.encoded_size = encoded_size;
    row.decoded_size = decoded_size;
    row.frames = animation.frame_count();
    Ok(row)
}

/// Rows for every blob, composite and animation. Entries whose word stream
/// cannot be scanned are logged and left out.
pub fn summarize(catalog: &Catalog) -> Vec<SummaryRow> {
    let blobs = catalog.blobs().map(|blob| blob_row(catalog, blob.address));
    let composites = catalog
        .composites()
        .iter()
        .map(|composite| composite_row(catalog, composite));
    let animations = catalog
        .animations()
        .iter()
        .map(|animation| animation_row(catalog, animation));

    blobs
        .chain(composites)
        .chain(animations)
        .filter_map(|row| match row {
            Ok(row) => Some(row),
            Err(err) => {
                warn!("leaving entry out of summary: {err}");
                None
            }
        })
        .collect()
}

fn composite_first(composite: &Composite) -> Result<u32> {
    composite.addresses.first().copied().ok_or_else(|| CatalogError::Compose {
        name: composite.label(),
        source: blast_formats::BlastError::TileCountMismatch {
            layout: composite.layout,
            expected: composite.layout.tile_count(),
            actual: 0,
        },
    })
}

fn sum_sizes(catalog: &Catalog, addresses: &[u32]) -> Result<(usize, usize)> {
    let mut encoded = 0;
    let mut decoded = 0;
    for &address in addresses {
        let blob = catalog.blob(address).ok_or(CatalogError::UnknownBlob(address))?;
        encoded += blob.data.len();
        decoded += catalog.decoded_len(address)?;
    }
    Ok((encoded, decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blast_formats::{CompositeLayout, EncodedBlob, Variant};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        // 1024 literals -> 2048 decoded bytes, a known 32x32 RGBA16 size.
        catalog.insert_blob(EncodedBlob::new(0xDB08, Variant::Rgba16, vec![0; 2048]));
        catalog.insert_blob(EncodedBlob::new(0xDB10, Variant::Rgba16, vec![0; 2048]));
        catalog
    }

    #[test]
    fn blob_rows_report_guessed_size() {
        let row = blob_row(&catalog(), 0xDB08).unwrap();
        assert_eq!(row.address, "0x00DB08");
        assert_eq!(row.variant, "BLAST1_RGBA16");
        assert_eq!(row.format, "rgba16");
        assert_eq!((row.width, row.height), (Some(32), Some(32)));
        assert_eq!((row.encoded_size, row.decoded_size), (2048, 2048));
        assert_eq!(row.kind, AssetKind::Image);
    }

    #[test]
    fn composite_rows_sum_tiles() {
        let composite =
            Composite::new(CompositeLayout::RightLeft, vec![0xDB08, 0xDB10]).named("banner");
        let row = composite_row(&catalog(), &composite).unwrap();
        assert_eq!(row.name.as_deref(), Some("banner"));
        assert_eq!((row.width, row.height), (Some(64), Some(32)));
        assert_eq!(row.encoded_size, 4096);
        assert_eq!(row.frames, 1);
    }

    #[test]
    fn summary_lists_everything_and_serializes() {
        let mut catalog = catalog();
        catalog
            .add_animation(Animation::tiles("flicker", vec![0xDB08, 0xDB10]))
            .unwrap();
        let rows = summarize(&catalog);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].kind, AssetKind::Animation);
        assert_eq!(rows[2].frames, 2);

        let json = serde_json::to_value(&rows[2]).unwrap();
        assert_eq!(json["kind"], "animation");
        assert_eq!(json["address"], "0x00DB08");
    }

    #[test]
    fn unreadable_blobs_are_left_out() {
        let mut catalog = catalog();
        catalog.insert_blob(EncodedBlob::new(0xE000, Variant::Rgba16, vec![0; 3]));
        assert_eq!(summarize(&catalog).len(), 2);
    }
}
