//! romscope-texture
//!
//! Turns raw pixel data described by a [`PixelFormatDescriptor`] into a
//! [`CanonicalBitmap`] of RGBA8 pixels.
//!
//! # Example
//!
//! ```rust
//! use romscope_texture::{decode, DirectFormat, PixelEncoding, PixelFormatDescriptor, Rgba};
//!
//! let desc = PixelFormatDescriptor::new(1, 1, PixelEncoding::Direct(DirectFormat::Rgb565));
//! let texture = decode(&desc, &[0x00, 0xF8], None).unwrap();
//! assert_eq!(texture.bitmap.pixels()[0], Rgba::new(255, 0, 0, 255));
//! ```

pub mod bitmap;
pub mod decoder;
pub mod decompress;
pub mod error;
pub mod format;
pub mod pixel;

pub use bitmap::{CanonicalBitmap, Rgba};
pub use decoder::{decode, DecodedTexture, TextureDecoder, DEFAULT_MAX_BYTES};
pub use decompress::decompress;
pub use error::{TextureError, TextureResult};
pub use format::{
    BlockFormat, Compression, DirectFormat, NibbleOrder, PixelEncoding, PixelFormatDescriptor,
};
