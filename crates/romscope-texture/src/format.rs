//! Pixel format descriptors

use romscope_core::Endian;

use crate::error::{TextureError, TextureResult};

/// Direct-color pixel layouts.
///
/// 16-bit layouts name channels from the most significant bit down and are
/// read as words in the descriptor's byte order. 8, 24 and 32-bit layouts
/// name bytes in memory order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectFormat {
    Rgb565,
    Bgr565,
    Argb1555,
    Rgb555,
    Rgba4444,
    Argb4444,
    Rgb888,
    Bgr888,
    Rgba8888,
    Bgra8888,
    Argb8888,
    Abgr8888,
    /// Grayscale
    L8,
    /// Alpha only; color is white
    A8,
    /// Grayscale + alpha
    La88,
}

impl DirectFormat {
    /// Bytes per pixel
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            DirectFormat::L8 | DirectFormat::A8 => 1,
            DirectFormat::Rgb565
            | DirectFormat::Bgr565
            | DirectFormat::Argb1555
            | DirectFormat::Rgb555
            | DirectFormat::Rgba4444
            | DirectFormat::Argb4444
            | DirectFormat::La88 => 2,
            DirectFormat::Rgb888 | DirectFormat::Bgr888 => 3,
            DirectFormat::Rgba8888
            | DirectFormat::Bgra8888
            | DirectFormat::Argb8888
            | DirectFormat::Abgr8888 => 4,
        }
    }
}

/// Block-compressed formats (4x4 texel blocks)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockFormat {
    Bc1,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
}

impl BlockFormat {
    /// Bytes per 4x4 block
    pub const fn block_bytes(self) -> usize {
        match self {
            BlockFormat::Bc1 | BlockFormat::Bc4 => 8,
            BlockFormat::Bc2 | BlockFormat::Bc3 | BlockFormat::Bc5 => 16,
        }
    }

    pub(crate) fn texpresso(self) -> texpresso::Format {
        match self {
            BlockFormat::Bc1 => texpresso::Format::Bc1,
            BlockFormat::Bc2 => texpresso::Format::Bc2,
            BlockFormat::Bc3 => texpresso::Format::Bc3,
            BlockFormat::Bc4 => texpresso::Format::Bc4,
            BlockFormat::Bc5 => texpresso::Format::Bc5,
        }
    }
}

/// Which nibble of a 4bpp byte holds the first (leftmost) pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NibbleOrder {
    #[default]
    LowFirst,
    HighFirst,
}

/// How pixel values are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelEncoding {
    Direct(DirectFormat),
    /// 4-bit palette indices
    Ci4 {
        palette: DirectFormat,
        nibble: NibbleOrder,
    },
    /// 8-bit palette indices
    Ci8 { palette: DirectFormat },
    Block(BlockFormat),
}

impl PixelEncoding {
    /// Bits per stored pixel
    pub const fn bits_per_pixel(self) -> usize {
        match self {
            PixelEncoding::Direct(f) => f.bytes_per_pixel() * 8,
            PixelEncoding::Ci4 { .. } => 4,
            PixelEncoding::Ci8 { .. } => 8,
            PixelEncoding::Block(f) => f.block_bytes() / 2,
        }
    }

    /// Palette entry layout, if this is an indexed encoding
    pub const fn palette_format(self) -> Option<DirectFormat> {
        match self {
            PixelEncoding::Ci4 { palette, .. } | PixelEncoding::Ci8 { palette } => Some(palette),
            _ => None,
        }
    }

    /// Maximum number of palette entries addressable by an index
    pub const fn max_palette_entries(self) -> usize {
        match self {
            PixelEncoding::Ci4 { .. } => 16,
            PixelEncoding::Ci8 { .. } => 256,
            _ => 0,
        }
    }
}

/// Optional compression applied to the stored pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// zlib stream (RFC 1950)
    Zlib,
    /// Raw deflate (RFC 1951)
    Deflate,
    Zstd,
    /// LZ4 block without frame header
    Lz4Block,
}

/// Everything needed to interpret a raw pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormatDescriptor {
    /// Stored width
    pub width: u32,
    /// Stored height
    pub height: u32,
    /// Intended display width; defaults to the stored width
    pub display_width: u32,
    /// Intended display height; defaults to the stored height
    pub display_height: u32,
    pub encoding: PixelEncoding,
    /// Byte order of 16-bit words
    pub byte_order: Endian,
    pub compression: Option<Compression>,
}

impl PixelFormatDescriptor {
    /// Uncompressed little-endian data displayed at its stored size
    pub fn new(width: u32, height: u32, encoding: PixelEncoding) -> Self {
        Self {
            width,
            height,
            display_width: width,
            display_height: height,
            encoding,
            byte_order: Endian::Little,
            compression: None,
        }
    }

    pub fn with_display_size(mut self, width: u32, height: u32) -> Self {
        self.display_width = width;
        self.display_height = height;
        self
    }

    pub fn with_byte_order(mut self, order: Endian) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Bytes per row of stored pixel data. Sub-byte rows are padded to a byte.
    pub fn row_stride(&self) -> TextureResult<usize> {
        let bits = (self.width as u64) * self.encoding.bits_per_pixel() as u64;
        usize::try_from(bits.div_ceil(8)).map_err(|_| self.too_large(bits / 8))
    }

    /// Exact length of the (decompressed) pixel data
    pub fn expected_len(&self) -> TextureResult<usize> {
        self.check_dimensions()?;
        let needed = match self.encoding {
            PixelEncoding::Block(format) => {
                let blocks_x = (self.width as u64).div_ceil(4);
                let blocks_y = (self.height as u64).div_ceil(4);
                blocks_x * blocks_y * format.block_bytes() as u64
            }
            _ => self.row_stride()? as u64 * self.height as u64,
        };
        usize::try_from(needed).map_err(|_| self.too_large(needed))
    }

    /// Number of output pixels
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub(crate) fn check_dimensions(&self) -> TextureResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(TextureError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    fn too_large(&self, needed: u64) -> TextureError {
        TextureError::TooLarge {
            needed,
            limit: usize::MAX as u64,
        }
    }
}
