//! Texture decoding errors

use thiserror::Error;

/// Errors produced while turning raw texture data into a bitmap
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Decompression failed: {0}")]
    DecompressionError(String),

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Palette index {index} out of range ({entries} entries)")]
    PaletteOutOfRange { index: usize, entries: usize },

    #[error("Indexed format requires a palette")]
    MissingPalette,

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Texture too large: {needed} bytes exceeds limit of {limit}")]
    TooLarge { needed: u64, limit: u64 },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for texture operations
pub type TextureResult<T> = Result<T, TextureError>;
