use serde::{Deserialize, Serialize};

use crate::error::{BlastError, Result};
use crate::texture::RasterImage;

/// Arrangement of equally sized tiles on a composite canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompositeLayout {
    #[serde(alias = "TB")]
    TopBottom,
    #[serde(alias = "RL")]
    RightLeft,
    Quad,
}

impl CompositeLayout {
    pub fn tile_count(self) -> usize {
        match self {
            CompositeLayout::TopBottom | CompositeLayout::RightLeft => 2,
            CompositeLayout::Quad => 4,
        }
    }

    pub fn canvas_size(self, tile_width: u32, tile_height: u32) -> (u32, u32) {
        match self {
            CompositeLayout::TopBottom => (tile_width, tile_height * 2),
            CompositeLayout::RightLeft => (tile_width * 2, tile_height),
            CompositeLayout::Quad => (tile_width * 2, tile_height * 2),
        }
    }

    /// `(tile index, x, y)` for every tile. The listed order is not the
    /// on-screen order: the second tile of a pair goes top/left.
    pub fn placements(self, tile_width: u32, tile_height: u32) -> Vec<(usize, u32, u32)> {
        let (w, h) = (tile_width, tile_height);
        match self {
            CompositeLayout::TopBottom => vec![(1, 0, 0), (0, 0, h)],
            CompositeLayout::RightLeft => vec![(1, 0, 0), (0, w, 0)],
            CompositeLayout::Quad => vec![(2, 0, 0), (3, w, 0), (0, 0, h), (1, w, h)],
        }
    }
}

/// Assembles decoded tiles into one canvas of the same pixel layout.
pub fn compose(tiles: &[&RasterImage], layout: CompositeLayout) -> Result<RasterImage> {
    let expected = layout.tile_count();
    if tiles.len() != expected {
        return Err(BlastError::TileCountMismatch {
            layout,
            expected,
            actual: tiles.len(),
        });
    }

    let first = tiles[0];
    let (width, height) = (first.width(), first.height());
    for (index, tile) in tiles.iter().enumerate().skip(1) {
        if tile.width() != width || tile.height() != height {
            return Err(BlastError::TileSizeMismatch {
                index,
                width,
                height,
                actual_width: tile.width(),
                actual_height: tile.height(),
            });
        }
        if tile.layout() != first.layout() {
            return Err(BlastError::TileLayoutMismatch { index });
        }
    }

    let (canvas_width, canvas_height) = layout.canvas_size(width, height);
    let mut canvas = RasterImage::blank(canvas_width, canvas_height, first.layout());
    let bpp = first.layout().bytes_per_pixel();
    let tile_stride = first.stride();

    for (index, x, y) in layout.placements(width, height) {
        let tile = tiles[index];
        let start = x as usize * bpp;
        for row in 0..height {
            if let Some(src) = tile.row(row) {
                canvas.row_mut(y + row)[start..start + tile_stride].copy_from_slice(src);
            }
        }
    }

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::PixelLayout;

    fn solid(width: u32, height: u32, value: u8) -> RasterImage {
        let len = (width * height * 2) as usize;
        RasterImage::from_pixels(width, height, PixelLayout::GrayAlpha8, vec![value; len]).unwrap()
    }

    #[test]
    fn top_bottom_puts_second_tile_on_top() {
        let (a, b) = (solid(2, 3, 0xAA), solid(2, 3, 0xBB));
        let canvas = compose(&[&a, &b], CompositeLayout::TopBottom).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (2, 6));
        for y in 0..3 {
            assert!(canvas.row(y).unwrap().iter().all(|&v| v == 0xBB));
        }
        for y in 3..6 {
            assert!(canvas.row(y).unwrap().iter().all(|&v| v == 0xAA));
        }
    }

    #[test]
    fn right_left_puts_second_tile_left() {
        let (a, b) = (solid(2, 1, 1), solid(2, 1, 2));
        let canvas = compose(&[&a, &b], CompositeLayout::RightLeft).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (4, 1));
        assert_eq!(canvas.pixels(), &[2, 2, 2, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn quad_places_bottom_pair_first() {
        let tiles: Vec<RasterImage> = (0..4).map(|v| solid(1, 1, v)).collect();
        let refs: Vec<&RasterImage> = tiles.iter().collect();
        let canvas = compose(&refs, CompositeLayout::Quad).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (2, 2));
        assert_eq!(canvas.pixel(0, 0), Some(&[2, 2][..]));
        assert_eq!(canvas.pixel(1, 0), Some(&[3, 3][..]));
        assert_eq!(canvas.pixel(0, 1), Some(&[0, 0][..]));
        assert_eq!(canvas.pixel(1, 1), Some(&[1, 1][..]));
    }

    #[test]
    fn mismatched_tiles_are_rejected() {
        let (a, b) = (solid(2, 2, 0), solid(2, 3, 0));
        assert_eq!(
            compose(&[&a, &b], CompositeLayout::TopBottom),
            Err(BlastError::TileSizeMismatch {
                index: 1,
                width: 2,
                height: 2,
                actual_width: 2,
                actual_height: 3
            })
        );

        let rgba = RasterImage::from_pixels(2, 2, PixelLayout::Rgba8888, vec![0; 16]).unwrap();
        assert_eq!(
            compose(&[&a, &rgba], CompositeLayout::RightLeft),
            Err(BlastError::TileLayoutMismatch { index: 1 })
        );
    }

    #[test]
    fn tile_count_must_match_layout() {
        let a = solid(1, 1, 0);
        assert_eq!(
            compose(&[&a, &a], CompositeLayout::Quad),
            Err(BlastError::TileCountMismatch {
                layout: CompositeLayout::Quad,
                expected: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn layout_names_accept_short_forms() {
        let layout: CompositeLayout = serde_json::from_str("\"TB\"").unwrap();
        assert_eq!(layout, CompositeLayout::TopBottom);
        let layout: CompositeLayout = serde_json::from_str("\"Quad\"").unwrap();
        assert_eq!(layout, CompositeLayout::Quad);
    }
}
