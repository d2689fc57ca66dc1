pub mod animation;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod manifest;
pub mod summary;

pub use animation::{Animation, AnimationFrames, AnimationPlayer, Composite, FrameTarget};
pub use cache::{CacheKey, DecodeCache};
pub use catalog::{Catalog, DEFAULT_FRAME_INTERVAL};
pub use error::CatalogError;
pub use manifest::{Address, Manifest, load_catalog, parse_address};
pub use summary::{AssetKind, SummaryRow, summarize};
