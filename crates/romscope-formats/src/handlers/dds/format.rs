//! DDS texture format detection

use romscope_texture::{BlockFormat, DirectFormat, PixelEncoding, PixelFormatDescriptor};

use super::header::{pf_flags, DdsHeader, Dx10Header, PixelFormat};

/// DXGI formats this crate can name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DxgiFormat {
    Unknown = 0,
    R8G8B8A8Unorm = 28,
    R8G8B8A8UnormSrgb = 29,
    R8Unorm = 61,
    A8Unorm = 65,
    BC1Unorm = 71,
    BC1UnormSrgb = 72,
    BC2Unorm = 74,
    BC2UnormSrgb = 75,
    BC3Unorm = 77,
    BC3UnormSrgb = 78,
    BC4Unorm = 80,
    BC4Snorm = 81,
    BC5Unorm = 83,
    BC5Snorm = 84,
    B5G6R5Unorm = 85,
    B5G5R5A1Unorm = 86,
    B8G8R8A8Unorm = 87,
    B8G8R8A8UnormSrgb = 91,
    BC6HUf16 = 95,
    BC6HSf16 = 96,
    BC7Unorm = 98,
    BC7UnormSrgb = 99,
    B4G4R4A4Unorm = 115,
}

impl DxgiFormat {
    /// Create from u32 value
    pub fn from_u32(value: u32) -> Self {
        match value {
            28 => DxgiFormat::R8G8B8A8Unorm,
            29 => DxgiFormat::R8G8B8A8UnormSrgb,
            61 => DxgiFormat::R8Unorm,
            65 => DxgiFormat::A8Unorm,
            71 => DxgiFormat::BC1Unorm,
            72 => DxgiFormat::BC1UnormSrgb,
            74 => DxgiFormat::BC2Unorm,
            75 => DxgiFormat::BC2UnormSrgb,
            77 => DxgiFormat::BC3Unorm,
            78 => DxgiFormat::BC3UnormSrgb,
            80 => DxgiFormat::BC4Unorm,
            81 => DxgiFormat::BC4Snorm,
            83 => DxgiFormat::BC5Unorm,
            84 => DxgiFormat::BC5Snorm,
            85 => DxgiFormat::B5G6R5Unorm,
            86 => DxgiFormat::B5G5R5A1Unorm,
            87 => DxgiFormat::B8G8R8A8Unorm,
            91 => DxgiFormat::B8G8R8A8UnormSrgb,
            95 => DxgiFormat::BC6HUf16,
            96 => DxgiFormat::BC6HSf16,
            98 => DxgiFormat::BC7Unorm,
            99 => DxgiFormat::BC7UnormSrgb,
            115 => DxgiFormat::B4G4R4A4Unorm,
            _ => DxgiFormat::Unknown,
        }
    }
}

/// Detected texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// BC1..BC5, decodable
    Block(BlockFormat),
    /// Block Compressed 6 (HDR)
    Bc6h,
    /// Block Compressed 7
    Bc7,
    /// Uncompressed, described by channel masks or a DXGI format
    Uncompressed(DirectFormat),
    Unknown,
}

impl TextureFormat {
    /// Detect format from DDS header
    pub fn from_header(header: &DdsHeader, dx10: Option<&Dx10Header>) -> Self {
        match dx10 {
            Some(dx10) => Self::from_dxgi_format(dx10.dxgi_format),
            None => Self::from_pixel_format(&header.pixel_format),
        }
    }

    fn from_dxgi_format(format: u32) -> Self {
        use TextureFormat::{Block, Uncompressed};

        match DxgiFormat::from_u32(format) {
            DxgiFormat::BC1Unorm | DxgiFormat::BC1UnormSrgb => Block(BlockFormat::Bc1),
            DxgiFormat::BC2Unorm | DxgiFormat::BC2UnormSrgb => Block(BlockFormat::Bc2),
            DxgiFormat::BC3Unorm | DxgiFormat::BC3UnormSrgb => Block(BlockFormat::Bc3),
            DxgiFormat::BC4Unorm | DxgiFormat::BC4Snorm => Block(BlockFormat::Bc4),
            DxgiFormat::BC5Unorm | DxgiFormat::BC5Snorm => Block(BlockFormat::Bc5),
            DxgiFormat::BC6HUf16 | DxgiFormat::BC6HSf16 => TextureFormat::Bc6h,
            DxgiFormat::BC7Unorm | DxgiFormat::BC7UnormSrgb => TextureFormat::Bc7,
            DxgiFormat::R8G8B8A8Unorm | DxgiFormat::R8G8B8A8UnormSrgb => {
                Uncompressed(DirectFormat::Rgba8888)
            }
            DxgiFormat::B8G8R8A8Unorm | DxgiFormat::B8G8R8A8UnormSrgb => {
                Uncompressed(DirectFormat::Bgra8888)
            }
            // DXGI names channels from the least significant bit up
            DxgiFormat::B5G6R5Unorm => Uncompressed(DirectFormat::Rgb565),
            DxgiFormat::B5G5R5A1Unorm => Uncompressed(DirectFormat::Argb1555),
            DxgiFormat::B4G4R4A4Unorm => Uncompressed(DirectFormat::Argb4444),
            DxgiFormat::R8Unorm => Uncompressed(DirectFormat::L8),
            DxgiFormat::A8Unorm => Uncompressed(DirectFormat::A8),
            DxgiFormat::Unknown => TextureFormat::Unknown,
        }
    }

    fn from_pixel_format(pf: &PixelFormat) -> Self {
        use TextureFormat::{Block, Uncompressed};

        if pf.has_fourcc() {
            return match &pf.fourcc {
                b"DXT1" => Block(BlockFormat::Bc1),
                b"DXT2" | b"DXT3" => Block(BlockFormat::Bc2),
                b"DXT4" | b"DXT5" => Block(BlockFormat::Bc3),
                b"ATI1" | b"BC4U" => Block(BlockFormat::Bc4),
                b"ATI2" | b"BC5U" => Block(BlockFormat::Bc5),
                _ => TextureFormat::Unknown,
            };
        }

        let masks = (pf.r_bit_mask, pf.g_bit_mask, pf.b_bit_mask, pf.a_bit_mask);
        let direct = if pf.flags & pf_flags::RGB != 0 {
            match (pf.rgb_bit_count, masks) {
                (16, (0xF800, 0x07E0, 0x001F, _)) => Some(DirectFormat::Rgb565),
                (16, (0x7C00, 0x03E0, 0x001F, 0x8000)) => Some(DirectFormat::Argb1555),
                (16, (0x7C00, 0x03E0, 0x001F, 0)) => Some(DirectFormat::Rgb555),
                (16, (0x0F00, 0x00F0, 0x000F, 0xF000)) => Some(DirectFormat::Argb4444),
                (24, (0xFF_0000, 0xFF00, 0xFF, _)) => Some(DirectFormat::Bgr888),
                (24, (0xFF, 0xFF00, 0xFF_0000, _)) => Some(DirectFormat::Rgb888),
                (32, (0xFF_0000, 0xFF00, 0xFF, _)) => Some(DirectFormat::Bgra8888),
                (32, (0xFF, 0xFF00, 0xFF_0000, _)) => Some(DirectFormat::Rgba8888),
                _ => None,
            }
        } else if pf.flags & pf_flags::LUMINANCE != 0 {
            match pf.rgb_bit_count {
                8 => Some(DirectFormat::L8),
                16 if pf.flags & pf_flags::ALPHAPIXELS != 0 => Some(DirectFormat::La88),
                _ => None,
            }
        } else if pf.flags & pf_flags::ALPHA != 0 && pf.rgb_bit_count == 8 {
            Some(DirectFormat::A8)
        } else {
            None
        };

        direct.map_or(TextureFormat::Unknown, Uncompressed)
    }

    /// Display name
    pub fn name(&self) -> String {
        match self {
            TextureFormat::Block(format) => match format {
                BlockFormat::Bc1 => "BC1 (DXT1)".to_string(),
                BlockFormat::Bc2 => "BC2 (DXT3)".to_string(),
                BlockFormat::Bc3 => "BC3 (DXT5)".to_string(),
                BlockFormat::Bc4 => "BC4 (ATI1)".to_string(),
                BlockFormat::Bc5 => "BC5 (ATI2)".to_string(),
            },
            TextureFormat::Bc6h => "BC6H".to_string(),
            TextureFormat::Bc7 => "BC7".to_string(),
            TextureFormat::Uncompressed(format) => format!("{:?}", format).to_uppercase(),
            TextureFormat::Unknown => "Unknown".to_string(),
        }
    }

    /// Pixel encoding the texture decoder understands, if any
    pub fn encoding(&self) -> Option<PixelEncoding> {
        match *self {
            TextureFormat::Block(format) => Some(PixelEncoding::Block(format)),
            TextureFormat::Uncompressed(format) => Some(PixelEncoding::Direct(format)),
            TextureFormat::Bc6h | TextureFormat::Bc7 | TextureFormat::Unknown => None,
        }
    }

    /// Check if format is block-compressed
    pub fn is_compressed(&self) -> bool {
        matches!(
            self,
            TextureFormat::Block(_) | TextureFormat::Bc6h | TextureFormat::Bc7
        )
    }

    /// Byte size of one `width` x `height` image, or `None` for unknown
    /// formats and sizes that overflow
    pub fn level_size(&self, width: u32, height: u32) -> Option<u64> {
        match self.encoding() {
            Some(encoding) => PixelFormatDescriptor::new(width, height, encoding)
                .expected_len()
                .ok()
                .map(|len| len as u64),
            None if self.is_compressed() => {
                let blocks = u64::from(width.div_ceil(4)) * u64::from(height.div_ceil(4));
                blocks.checked_mul(16)
            }
            None => None,
        }
    }
}
