//! Canonical RGBA bitmap

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;

use crate::error::{TextureError, TextureResult};

/// One pixel in canonical channel order
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Dense RGBA8 image, rows top to bottom, pixels left to right
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBitmap {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl CanonicalBitmap {
    /// Wrap a pixel buffer; its length must be `width * height`
    pub fn new(width: u32, height: u32, pixels: Vec<Rgba>) -> TextureResult<Self> {
        let expected = width as u64 * height as u64;
        if pixels.len() as u64 != expected {
            return Err(TextureError::SizeMismatch {
                expected: expected as usize,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// Pixel at (x, y), if inside the bitmap
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Raw RGBA8 bytes
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn into_pixels(self) -> Vec<Rgba> {
        self.pixels
    }

    /// Copy into an `image` buffer
    pub fn to_image(&self) -> TextureResult<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.as_bytes().to_vec()).ok_or(
            TextureError::InvalidDimensions {
                width: self.width,
                height: self.height,
            },
        )
    }

    /// Write the bitmap as a PNG file
    pub fn save_png(&self, path: impl AsRef<Path>) -> TextureResult<()> {
        self.to_image()?
            .save_with_format(path.as_ref(), image::ImageFormat::Png)?;
        Ok(())
    }
}
