//! DDS header structures

use romscope_core::{ByteSource, DecodedStruct, FieldSpec, StructDescriptor};

use crate::traits::{ParseError, ParseResult};

/// "DDS " read as a little-endian u32
pub const DDS_MAGIC: u32 = 0x2053_4444;

/// Value of the header's own size field
pub const HEADER_SIZE: u32 = 124;

/// Magic plus header
pub const BASE_HEADER_LEN: u64 = 4 + HEADER_SIZE as u64;

/// Length of the DX10 extension header
pub const DX10_HEADER_LEN: u64 = 20;

/// Caps2 flags
pub mod caps2 {
    pub const CUBEMAP: u32 = 0x200;
    pub const CUBEMAP_POSITIVEX: u32 = 0x400;
    pub const CUBEMAP_NEGATIVEX: u32 = 0x800;
    pub const CUBEMAP_POSITIVEY: u32 = 0x1000;
    pub const CUBEMAP_NEGATIVEY: u32 = 0x2000;
    pub const CUBEMAP_POSITIVEZ: u32 = 0x4000;
    pub const CUBEMAP_NEGATIVEZ: u32 = 0x8000;
    pub const CUBEMAP_ALL_FACES: u32 = CUBEMAP_POSITIVEX
        | CUBEMAP_NEGATIVEX
        | CUBEMAP_POSITIVEY
        | CUBEMAP_NEGATIVEY
        | CUBEMAP_POSITIVEZ
        | CUBEMAP_NEGATIVEZ;
    pub const VOLUME: u32 = 0x200000;
}

/// DDS pixel format flags
pub mod pf_flags {
    pub const ALPHAPIXELS: u32 = 0x1;
    pub const ALPHA: u32 = 0x2;
    pub const FOURCC: u32 = 0x4;
    pub const RGB: u32 = 0x40;
    pub const LUMINANCE: u32 = 0x20000;
}

/// DX10 misc flag marking a cube texture
pub const DX10_MISC_TEXTURECUBE: u32 = 0x4;

/// Magic, header and embedded pixel format, offsets from the start of the file
static DDS_HEADER: StructDescriptor = StructDescriptor::new(
    "DDS_HEADER",
    BASE_HEADER_LEN as usize,
    &[
        FieldSpec::u32_le("magic", 0),
        FieldSpec::u32_le("size", 4),
        FieldSpec::u32_le("flags", 8),
        FieldSpec::u32_le("height", 12),
        FieldSpec::u32_le("width", 16),
        FieldSpec::u32_le("pitch_or_linear_size", 20),
        FieldSpec::u32_le("depth", 24),
        FieldSpec::u32_le("mipmap_count", 28),
        FieldSpec::u32_le("pf_size", 76),
        FieldSpec::u32_le("pf_flags", 80),
        FieldSpec::bytes("fourcc", 84, 4),
        FieldSpec::u32_le("rgb_bit_count", 88),
        FieldSpec::u32_le("r_bit_mask", 92),
        FieldSpec::u32_le("g_bit_mask", 96),
        FieldSpec::u32_le("b_bit_mask", 100),
        FieldSpec::u32_le("a_bit_mask", 104),
        FieldSpec::u32_le("caps", 108),
        FieldSpec::u32_le("caps2", 112),
    ],
);

static DX10_HEADER: StructDescriptor = StructDescriptor::new(
    "DDS_HEADER_DXT10",
    DX10_HEADER_LEN as usize,
    &[
        FieldSpec::u32_le("dxgi_format", 0),
        FieldSpec::u32_le("resource_dimension", 4),
        FieldSpec::u32_le("misc_flag", 8),
        FieldSpec::u32_le("array_size", 12),
        FieldSpec::u32_le("misc_flags2", 16),
    ],
);

/// DDS pixel format (32 bytes inside the header)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    pub size: u32,
    pub flags: u32,
    pub fourcc: [u8; 4],
    pub rgb_bit_count: u32,
    pub r_bit_mask: u32,
    pub g_bit_mask: u32,
    pub b_bit_mask: u32,
    pub a_bit_mask: u32,
}

impl PixelFormat {
    pub fn has_fourcc(&self) -> bool {
        self.flags & pf_flags::FOURCC != 0
    }

    /// FourCC as text, with non-printable bytes replaced
    pub fn fourcc_string(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).into_owned()
    }
}

/// DDS header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsHeader {
    pub magic: u32,
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub pixel_format: PixelFormat,
    pub caps: u32,
    pub caps2: u32,
}

impl DdsHeader {
    /// Decode the header from a prefix of the file
    pub fn from_bytes(bytes: &[u8]) -> romscope_core::Result<Self> {
        Self::from_struct(&DDS_HEADER.decode_bytes(bytes, 0)?)
    }

    /// Read and validate the header at the start of `source`
    pub fn read(source: &dyn ByteSource) -> ParseResult<Self> {
        let header = Self::from_struct(&DDS_HEADER.decode(source, 0)?)?;

        if header.magic != DDS_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: DDS_MAGIC.to_le_bytes().to_vec(),
                found: header.magic.to_le_bytes().to_vec(),
            });
        }
        if header.size != HEADER_SIZE {
            return Err(ParseError::InvalidStructure(format!(
                "Invalid DDS header size: expected {}, got {}",
                HEADER_SIZE, header.size
            )));
        }
        Ok(header)
    }

    fn from_struct(s: &DecodedStruct<'_>) -> romscope_core::Result<Self> {
        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(s.bytes("fourcc")?);

        Ok(Self {
            magic: s.u32("magic")?,
            size: s.u32("size")?,
            flags: s.u32("flags")?,
            height: s.u32("height")?,
            width: s.u32("width")?,
            pitch_or_linear_size: s.u32("pitch_or_linear_size")?,
            depth: s.u32("depth")?,
            mipmap_count: s.u32("mipmap_count")?,
            pixel_format: PixelFormat {
                size: s.u32("pf_size")?,
                flags: s.u32("pf_flags")?,
                fourcc,
                rgb_bit_count: s.u32("rgb_bit_count")?,
                r_bit_mask: s.u32("r_bit_mask")?,
                g_bit_mask: s.u32("g_bit_mask")?,
                b_bit_mask: s.u32("b_bit_mask")?,
                a_bit_mask: s.u32("a_bit_mask")?,
            },
            caps: s.u32("caps")?,
            caps2: s.u32("caps2")?,
        })
    }

    /// Check if this DDS has a DX10 extended header
    pub fn has_dx10_header(&self) -> bool {
        self.pixel_format.has_fourcc() && self.pixel_format.fourcc == *b"DX10"
    }

    /// Check if this is a cubemap
    pub fn is_cubemap(&self) -> bool {
        self.caps2 & caps2::CUBEMAP != 0
    }

    pub fn is_volume(&self) -> bool {
        self.caps2 & caps2::VOLUME != 0
    }

    /// Number of stored cube faces; a cubemap without face bits stores all six
    pub fn cube_faces(&self) -> u32 {
        match (self.caps2 & caps2::CUBEMAP_ALL_FACES).count_ones() {
            0 => 6,
            n => n,
        }
    }

    /// Mip level count, treating 0 as 1
    pub fn mip_levels(&self) -> u32 {
        self.mipmap_count.max(1)
    }
}

/// DX10 extended header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dx10Header {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

impl Dx10Header {
    /// Read the extension header that follows the base header
    pub fn read(source: &dyn ByteSource) -> ParseResult<Self> {
        let s = DX10_HEADER.decode(source, BASE_HEADER_LEN)?;
        Ok(Self {
            dxgi_format: s.u32("dxgi_format")?,
            resource_dimension: s.u32("resource_dimension")?,
            misc_flag: s.u32("misc_flag")?,
            array_size: s.u32("array_size")?,
            misc_flags2: s.u32("misc_flags2")?,
        })
    }

    pub fn is_cubemap(&self) -> bool {
        self.misc_flag & DX10_MISC_TEXTURECUBE != 0
    }
}
