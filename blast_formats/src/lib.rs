pub mod blast;
pub mod composite;
pub mod error;
pub mod palette;
pub mod resolution;
pub mod texture;
pub mod variant;

pub use blast::{EncodedBlob, Token, decode, decode_blob, decode_with_palette, inspect};
pub use composite::{CompositeLayout, compose};
pub use error::BlastError;
pub use palette::PaletteTable;
pub use resolution::guess_resolution;
pub use texture::{Flip, PixelLayout, RasterImage, TexelFormat, unpack, unpack_texels};
pub use variant::Variant;
