use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use blast_formats::blast::{self, EncodedBlob};
use blast_formats::{PaletteTable, RasterImage, Variant, compose, guess_resolution};
use log::{debug, info};

use crate::animation::{Animation, AnimationFrames, AnimationPlayer, Composite, FrameTarget};
use crate::cache::{CacheKey, DecodeCache};
use crate::error::CatalogError;

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Every blob, palette, composite and animation known for one source image,
/// with the palette chosen for each paletted blob and the decodes made so far.
#[derive(Debug)]
pub struct Catalog {
    blobs: BTreeMap<u32, EncodedBlob>,
    palettes: BTreeMap<u32, PaletteTable>,
    selections: HashMap<u32, u32>,
    default_palettes: HashMap<usize, u32>,
    composites: Vec<Composite>,
    animations: Vec<Animation>,
    frame_interval: Duration,
    cache: DecodeCache,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            blobs: BTreeMap::new(),
            palettes: BTreeMap::new(),
            selections: HashMap::new(),
            default_palettes: HashMap::new(),
            composites: Vec::new(),
            animations: Vec::new(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            cache: DecodeCache::new(),
        }
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a blob, replacing any previous blob at the same address.
    pub fn insert_blob(&mut self, blob: EncodedBlob) -> Option<EncodedBlob> {
        self.cache.invalidate_address(blob.address);
        self.blobs.insert(blob.address, blob)
    }

    /// Registers a palette. Replacing one evicts every decode made with it.
    pub fn insert_palette(&mut self, address: u32, palette: PaletteTable) -> Option<PaletteTable> {
        let previous = self.palettes.insert(address, palette);
        if previous.is_some() {
            let evicted = self.cache.invalidate_palette(address);
            debug!("palette 0x{address:06X} replaced; evicted {evicted} decodes");
        }
        previous
    }

    /// Makes `address` the fallback palette for blobs needing a table of its size.
    pub fn set_default_palette(&mut self, address: u32) -> Result<()> {
        let entries = self
            .palettes
            .get(&address)
            .ok_or(CatalogError::UnknownPalette(address))?
            .entries();
        self.default_palettes.insert(entries, address);
        Ok(())
    }

    pub fn add_composite(&mut self, composite: Composite) -> Result<()> {
        self.check_composite(&composite)?;
        self.composites.push(composite);
        Ok(())
    }

    /// Registers an animation. Frames must reference known blobs and every
    /// tile must share one variant.
    pub fn add_animation(&mut self, animation: Animation) -> Result<()> {
        if animation.frame_count() == 0 {
            return Err(CatalogError::EmptyAnimation(animation.name.clone()));
        }
        if let AnimationFrames::Composites(frames) = &animation.frames {
            for frame in frames {
                self.check_composite(frame)?;
            }
        }

        let addresses = animation.addresses();
        let mut first: Option<Variant> = None;
        for &address in &addresses {
            let variant = self.blob_or_err(address)?.variant;
            match first {
                None => first = Some(variant),
                Some(first) if first != variant => {
                    return Err(CatalogError::MixedVariants {
                        start: addresses[0],
                        end: addresses[addresses.len() - 1],
                        first,
                        other: variant,
                    });
                }
                Some(_) => {}
            }
        }

        self.animations.push(animation);
        Ok(())
    }

    pub fn blob(&self, address: u32) -> Option<&EncodedBlob> {
        self.blobs.get(&address)
    }

    pub fn blobs(&self) -> impl Iterator<Item = &EncodedBlob> {
        self.blobs.values()
    }

    pub fn palette(&self, address: u32) -> Option<&PaletteTable> {
        self.palettes.get(&address)
    }

    pub fn palettes(&self) -> impl Iterator<Item = (u32, &PaletteTable)> {
        self.palettes.iter().map(|(address, palette)| (*address, palette))
    }

    pub fn composites(&self) -> &[Composite] {
        &self.composites
    }

    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    pub fn animation(&self, name: &str) -> Result<&Animation> {
        self.animations
            .iter()
            .find(|animation| animation.name == name)
            .ok_or_else(|| CatalogError::UnknownAnimation(name.to_string()))
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn set_frame_interval(&mut self, interval: Duration) {
        self.frame_interval = interval;
    }

    pub fn player(&self, name: &str) -> Result<AnimationPlayer> {
        AnimationPlayer::new(self.animation(name)?, self.frame_interval)
    }

    pub fn cache(&self) -> &DecodeCache {
        &self.cache
    }

    /// Palette used to decode `address`, or `None` for unpaletted variants.
    ///
    /// An explicit selection wins, then the default for the table size, then
    /// the highest-addressed palette of that size.
    pub fn palette_selection(&self, address: u32) -> Result<Option<u32>> {
        let blob = self.blob_or_err(address)?;
        let Some(entries) = blob.variant.palette_entries() else {
            return Ok(None);
        };

        if let Some(&selected) = self.selections.get(&address) {
            return Ok(Some(selected));
        }
        if let Some(&default) = self.default_palettes.get(&entries) {
            if self.palettes.contains_key(&default) {
                return Ok(Some(default));
            }
        }
        self.palettes
            .iter()
            .rev()
            .find(|(_, palette)| palette.entries() == entries)
            .map(|(palette_address, _)| Some(*palette_address))
            .ok_or(CatalogError::NoPaletteSelected { address, entries })
    }

    pub fn select_palette(&mut self, address: u32, palette: u32) -> Result<()> {
        let expected = self
            .blob_or_err(address)?
            .variant
            .palette_entries()
            .ok_or(CatalogError::PaletteNotUsed(address))?;
        let actual = self
            .palettes
            .get(&palette)
            .ok_or(CatalogError::UnknownPalette(palette))?
            .entries();
        if actual != expected {
            return Err(CatalogError::WrongPaletteSize {
                address,
                palette,
                expected,
                actual,
            });
        }

        let effective = self.palette_selection(address).ok().flatten();
        self.selections.insert(address, palette);
        if effective != Some(palette) {
            let evicted = self.cache.invalidate_address(address);
            debug!("0x{address:06X} now uses palette 0x{palette:06X}; evicted {evicted} decodes");
        }
        Ok(())
    }

    /// Gives every paletted blob in `addresses` the palette the first one uses.
    pub fn share_palette(&mut self, addresses: &[u32]) -> Result<Option<u32>> {
        let Some(&first) = addresses.first() else {
            return Ok(None);
        };
        let Some(palette) = self.palette_selection(first)? else {
            return Ok(None);
        };
        for &address in addresses {
            if self.blob_or_err(address)?.variant.requires_palette() {
                self.select_palette(address, palette)?;
            }
        }
        Ok(Some(palette))
    }

    pub fn share_animation_palette(&mut self, name: &str) -> Result<Option<u32>> {
        let addresses = self.animation(name)?.addresses();
        let shared = self.share_palette(&addresses)?;
        if let Some(palette) = shared {
            info!(
                "animation {name}: {} tiles share palette 0x{palette:06X}",
                addresses.len()
            );
        }
        Ok(shared)
    }

    /// Decodes and unpacks a blob with its selected palette, reusing a
    /// previous decode when one exists.
    pub fn render(&self, address: u32) -> Result<Arc<RasterImage>> {
        let blob = self.blob_or_err(address)?;
        let palette_address = self.palette_selection(address)?;
        let palette = match palette_address {
            Some(palette) => Some(
                self.palettes
                    .get(&palette)
                    .ok_or(CatalogError::UnknownPalette(palette))?,
            ),
            None => None,
        };

        let key = CacheKey {
            address,
            palette: palette_address,
        };
        self.cache.get_or_decode(key, || {
            blob.render(palette).map_err(|source| CatalogError::Decode {
                address,
                variant: blob.variant,
                source,
            })
        })
    }

    pub fn render_composite(&self, composite: &Composite) -> Result<RasterImage> {
        let tiles = composite
            .addresses
            .iter()
            .map(|&address| self.render(address))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&RasterImage> = tiles.iter().map(Arc::as_ref).collect();
        compose(&refs, composite.layout).map_err(|source| CatalogError::Compose {
            name: composite.label(),
            source,
        })
    }

    /// Image for the player's current frame of `animation`.
    pub fn render_frame(
        &self,
        animation: &Animation,
        player: &AnimationPlayer,
    ) -> Result<Arc<RasterImage>> {
        match player.current(animation) {
            Some(FrameTarget::Tile(address)) => self.render(address),
            Some(FrameTarget::Composite(composite)) => {
                self.render_composite(composite).map(Arc::new)
            }
            None => Err(CatalogError::EmptyAnimation(animation.name.clone())),
        }
    }

    /// Blob addresses in `start..=end`, which must all share one variant.
    pub fn sequence_in_range(&self, start: u32, end: u32) -> Result<Vec<u32>> {
        let mut first: Option<Variant> = None;
        let mut addresses = Vec::new();
        for blob in self.blobs.range(start..=end).map(|(_, blob)| blob) {
            match first {
                None => first = Some(blob.variant),
                Some(first) if first != blob.variant => {
                    return Err(CatalogError::MixedVariants {
                        start,
                        end,
                        first,
                        other: blob.variant,
                    });
                }
                Some(_) => {}
            }
            addresses.push(blob.address);
        }
        Ok(addresses)
    }

    /// Length the blob decodes to, computed from its word stream alone.
    pub fn decoded_len(&self, address: u32) -> Result<usize> {
        let blob = self.blob_or_err(address)?;
        let tokens =
            blast::inspect(blob.variant, &blob.data).map_err(|source| CatalogError::Decode {
                address,
                variant: blob.variant,
                source,
            })?;
        Ok(blast::stream_stats(blob.variant, &tokens).decoded_len)
    }

    /// Stored dimensions, else the estimate for the decoded length.
    pub fn dimensions(&self, address: u32) -> Result<Option<(u32, u32)>> {
        let blob = self.blob_or_err(address)?;
        if let Some(dimensions) = blob.dimensions() {
            return Ok(Some(dimensions));
        }
        let decoded_len = self.decoded_len(address)?;
        Ok(guess_resolution(blob.variant, decoded_len))
    }

    fn blob_or_err(&self, address: u32) -> Result<&EncodedBlob> {
        self.blobs.get(&address).ok_or(CatalogError::UnknownBlob(address))
    }

    fn check_composite(&self, composite: &Composite) -> Result<()> {
        let expected = composite.layout.tile_count();
        if composite.addresses.len() != expected {
            return Err(CatalogError::Compose {
                name: composite.label(),
                source: blast_formats::BlastError::TileCountMismatch {
                    layout: composite.layout,
                    expected,
                    actual: composite.addresses.len(),
                },
            });
        }
        for &address in &composite.addresses {
            self.blob_or_err(address)?;
        }
        Ok(())
    }
}
