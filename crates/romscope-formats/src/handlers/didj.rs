//! Leapster Didj `.tex` textures
//!
//! A 36-byte little-endian header followed by a single zlib stream. Paletted
//! formats store the palette (16-bit entries) first, then the pixel indices.

use tracing::{debug, warn};

use romscope_core::{ByteSource, DecodedStruct, FieldSpec, StructDescriptor};
use romscope_texture::{
    decompress, Compression, DirectFormat, NibbleOrder, PixelEncoding, PixelFormatDescriptor,
    TextureError,
};

use crate::traits::{
    Confidence, FormatHandler, ParseError, ParseOptions, ParseResult, ParsedFile, ProbeInfo,
};

const MAGIC: u32 = 3;

/// Header size; the zlib stream starts right after it
pub const HEADER_SIZE: usize = 36;

static HEADER: StructDescriptor = StructDescriptor::new(
    "Didj_Tex_Header",
    HEADER_SIZE,
    &[
        FieldSpec::u32_le("magic", 0x00),
        FieldSpec::u32_le("width_disp", 0x04),
        FieldSpec::u32_le("height_disp", 0x08),
        FieldSpec::u32_le("width", 0x0C),
        FieldSpec::u32_le("height", 0x10),
        FieldSpec::u32_le("uncompr_size", 0x14),
        FieldSpec::u32_le("px_format", 0x18),
        FieldSpec::u32_le("num_images", 0x1C),
        FieldSpec::u32_le("compr_size", 0x20),
    ],
);

/// Pixel formats found in Didj textures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DidjPixelFormat {
    Rgb565 = 1,
    Rgba4444 = 3,
    Ci8Rgb565 = 4,
    Ci8Rgba4444 = 6,
    Ci4Rgb565 = 7,
    Ci4Rgba4444 = 9,
}

impl DidjPixelFormat {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Rgb565),
            3 => Some(Self::Rgba4444),
            4 => Some(Self::Ci8Rgb565),
            6 => Some(Self::Ci8Rgba4444),
            7 => Some(Self::Ci4Rgb565),
            9 => Some(Self::Ci4Rgba4444),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rgb565 => "RGB565",
            Self::Rgba4444 => "RGBA4444",
            Self::Ci8Rgb565 => "8bpp with RGB565 palette",
            Self::Ci8Rgba4444 => "8bpp with RGBA4444 palette",
            Self::Ci4Rgb565 => "4bpp with RGB565 palette",
            Self::Ci4Rgba4444 => "4bpp with RGBA4444 palette",
        }
    }

    pub fn encoding(self) -> PixelEncoding {
        match self {
            Self::Rgb565 => PixelEncoding::Direct(DirectFormat::Rgb565),
            Self::Rgba4444 => PixelEncoding::Direct(DirectFormat::Rgba4444),
            Self::Ci8Rgb565 => PixelEncoding::Ci8 { palette: DirectFormat::Rgb565 },
            Self::Ci8Rgba4444 => PixelEncoding::Ci8 { palette: DirectFormat::Rgba4444 },
            Self::Ci4Rgb565 => PixelEncoding::Ci4 {
                palette: DirectFormat::Rgb565,
                nibble: NibbleOrder::LowFirst,
            },
            Self::Ci4Rgba4444 => PixelEncoding::Ci4 {
                palette: DirectFormat::Rgba4444,
                nibble: NibbleOrder::LowFirst,
            },
        }
    }

    /// Bytes of palette data in front of the indices
    pub fn palette_len(self) -> usize {
        let encoding = self.encoding();
        match encoding.palette_format() {
            Some(format) => encoding.max_palette_entries() * format.bytes_per_pixel(),
            None => 0,
        }
    }
}

/// Decoded Didj header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DidjHeader {
    pub magic: u32,
    pub width_disp: u32,
    pub height_disp: u32,
    pub width: u32,
    pub height: u32,
    pub uncompr_size: u32,
    pub px_format: u32,
    pub num_images: u32,
    pub compr_size: u32,
}

impl DidjHeader {
    fn from_struct(s: &DecodedStruct<'_>) -> romscope_core::Result<Self> {
        Ok(Self {
            magic: s.u32("magic")?,
            width_disp: s.u32("width_disp")?,
            height_disp: s.u32("height_disp")?,
            width: s.u32("width")?,
            height: s.u32("height")?,
            uncompr_size: s.u32("uncompr_size")?,
            px_format: s.u32("px_format")?,
            num_images: s.u32("num_images")?,
            compr_size: s.u32("compr_size")?,
        })
    }

    /// Header checks that need nothing but the header and the file length
    fn is_plausible(&self, total_len: u64) -> bool {
        self.magic == MAGIC
            && self.num_images == 1
            && DidjPixelFormat::from_u32(self.px_format).is_some()
            && self.width != 0
            && self.height != 0
            && HEADER_SIZE as u64 + u64::from(self.compr_size) <= total_len
    }
}

/// Handler for Didj `.tex` files
#[derive(Debug, Default, Clone, Copy)]
pub struct DidjTexHandler;

impl DidjTexHandler {
    fn decode_texture(
        &self,
        source: &dyn ByteSource,
        options: &ParseOptions,
        header: &DidjHeader,
        format: DidjPixelFormat,
        parsed: &mut ParsedFile,
    ) -> ParseResult<()> {
        let desc = PixelFormatDescriptor::new(header.width, header.height, format.encoding())
            .with_display_size(header.width_disp, header.height_disp);

        let palette_len = format.palette_len();
        let expected = palette_len as u64 + desc.expected_len()? as u64;
        if u64::from(header.uncompr_size) != expected {
            return Err(ParseError::InvalidStructure(format!(
                "uncompressed size {} does not match {}x{} {} ({} bytes)",
                header.uncompr_size,
                header.width,
                header.height,
                format.name(),
                expected
            )));
        }

        let expected = options.check_alloc(expected)?;
        let compressed_len = options.check_alloc(u64::from(header.compr_size))?;
        let compressed = source.read(HEADER_SIZE as u64, compressed_len)?;

        let data = decompress(Compression::Zlib, &compressed, expected, options.max_texture_bytes)?;
        if data.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: data.len(),
            }
            .into());
        }
        let (palette, pixels) = data.split_at(palette_len);
        let palette = (palette_len > 0).then_some(palette);

        let texture = options.texture_decoder().decode(&desc, pixels, palette)?;
        let bitmap = parsed.add_texture(texture);
        parsed.properties.set("image", bitmap);
        Ok(())
    }
}

impl FormatHandler for DidjTexHandler {
    fn id(&self) -> &'static str {
        "didj-tex"
    }

    fn name(&self) -> &'static str {
        "Leapster Didj Texture"
    }

    fn description(&self) -> &'static str {
        "Zlib-compressed 16-bit and paletted textures from the Leapster Didj"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tex"]
    }

    fn recognize(&self, probe: &ProbeInfo) -> Confidence {
        let header = match HEADER
            .decode_bytes(&probe.prefix, 0)
            .and_then(|s| DidjHeader::from_struct(&s))
        {
            Ok(header) => header,
            Err(_) => return Confidence::NONE,
        };

        if !header.is_plausible(probe.total_len) {
            return Confidence::NONE;
        }
        if probe.has_extension(self.extensions()) {
            Confidence::new(90)
        } else {
            Confidence::new(75)
        }
    }

    fn parse(&self, source: &dyn ByteSource, options: &ParseOptions) -> ParseResult<ParsedFile> {
        let header = DidjHeader::from_struct(&HEADER.decode(source, 0)?)?;

        if header.magic != MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: MAGIC.to_le_bytes().to_vec(),
                found: header.magic.to_le_bytes().to_vec(),
            });
        }
        if header.num_images != 1 {
            return Err(ParseError::UnsupportedFeature(format!(
                "{} images in one texture",
                header.num_images
            )));
        }
        if HEADER_SIZE as u64 + u64::from(header.compr_size) > source.len() {
            return Err(romscope_core::Error::OutOfRange {
                offset: HEADER_SIZE as u64,
                length: u64::from(header.compr_size),
                size: source.len(),
            }
            .into());
        }

        let format = DidjPixelFormat::from_u32(header.px_format);
        debug!(?header, ?format, "didj header");

        let mut parsed = ParsedFile::new(self.id());
        let props = &mut parsed.properties;
        props.set("display_width", header.width_disp);
        props.set("display_height", header.height_disp);
        props.set("width", header.width);
        props.set("height", header.height);
        props.set(
            "pixel_format",
            match format {
                Some(format) => format.name().to_string(),
                None => format!("Unknown ({})", header.px_format),
            },
        );
        props.set("compressed_size", header.compr_size);
        props.set("uncompressed_size", header.uncompr_size);

        match format {
            Some(format) if options.decode_textures => {
                self.decode_texture(source, options, &header, format, &mut parsed)
                    .map_err(|e| e.with_context("decoding Didj texture"))?;
            }
            Some(_) => {}
            None => warn!(px_format = header.px_format, "unsupported Didj pixel format, no image"),
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use romscope_core::MemorySource;
    use romscope_texture::Rgba;
    use std::io::Write;

    fn build_tex(px_format: u32, width: u32, height: u32, payload: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let fields = [
            MAGIC,
            width,
            height,
            width,
            height,
            payload.len() as u32,
            px_format,
            1,
            compressed.len() as u32,
        ];
        let mut file: Vec<u8> = fields.iter().flat_map(|v| v.to_le_bytes()).collect();
        file.extend_from_slice(&compressed);
        file
    }

    fn probe(file: &[u8], ext: Option<&str>) -> ProbeInfo {
        ProbeInfo::new(file.to_vec(), file.len() as u64).with_extension(ext)
    }

    #[test]
    fn test_recognize() {
        let file = build_tex(1, 2, 2, &[0u8; 8]);
        let handler = DidjTexHandler;
        assert_eq!(handler.recognize(&probe(&file, Some("tex"))).value(), 90);
        assert_eq!(handler.recognize(&probe(&file, None)).value(), 75);

        // Compressed size past the end of the file
        assert_eq!(handler.recognize(&probe(&file[..file.len() - 1], None)), Confidence::NONE);

        let mut bad_magic = file.clone();
        bad_magic[0] = 4;
        assert_eq!(handler.recognize(&probe(&bad_magic, None)), Confidence::NONE);
    }

    #[test]
    fn test_parse_rgb565() {
        // red, green, blue, white
        let payload = [0x00, 0xF8, 0xE0, 0x07, 0x1F, 0x00, 0xFF, 0xFF];
        let file = build_tex(1, 2, 2, &payload);
        let parsed = DidjTexHandler
            .parse(&MemorySource::new(file), &ParseOptions::default())
            .unwrap();

        assert_eq!(parsed.properties.get("width").unwrap().as_u64(), Some(2));
        assert_eq!(parsed.properties.get("pixel_format").unwrap().as_str(), Some("RGB565"));
        let texture = &parsed.textures[0];
        assert_eq!(texture.bitmap.pixels()[0], Rgba::new(255, 0, 0, 255));
        assert_eq!(texture.bitmap.pixels()[3], Rgba::new(255, 255, 255, 255));
    }

    #[test]
    fn test_parse_ci4_palette_first() {
        // 16-entry RGB565 palette: entry 1 is red
        let mut payload = vec![0u8; 32];
        payload[2..4].copy_from_slice(&0xF800u16.to_le_bytes());
        // 2x1 pixels, low nibble first: pixel 0 = 1, pixel 1 = 0
        payload.push(0x01);

        let file = build_tex(7, 2, 1, &payload);
        let parsed = DidjTexHandler
            .parse(&MemorySource::new(file), &ParseOptions::default())
            .unwrap();
        let pixels = parsed.textures[0].bitmap.pixels();
        assert_eq!(pixels[0], Rgba::new(255, 0, 0, 255));
        assert_eq!(pixels[1], Rgba::new(0, 0, 0, 255));
    }

    #[test]
    fn test_uncompressed_size_must_match() {
        let mut file = build_tex(1, 2, 2, &[0u8; 8]);
        // Claim 2x3 instead of 2x2
        file[0x10..0x14].copy_from_slice(&3u32.to_le_bytes());
        let result = DidjTexHandler.parse(&MemorySource::new(file), &ParseOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_short_stream_is_size_mismatch() {
        // 6 bytes inflated where the header promises a 2x2 RGB565 image
        let mut file = build_tex(1, 2, 2, &[0u8; 6]);
        file[20..24].copy_from_slice(&8u32.to_le_bytes());
        let err = DidjTexHandler
            .parse(&MemorySource::new(file), &ParseOptions::default())
            .unwrap_err();
        let ParseError::Nested { source, .. } = err else {
            panic!("expected context around the texture error, got {:?}", err);
        };
        assert!(matches!(
            *source,
            ParseError::Texture(TextureError::SizeMismatch { expected: 8, actual: 6 })
        ));
    }

    #[test]
    fn test_skip_texture_decode() {
        let file = build_tex(1, 2, 2, &[0u8; 8]);
        let options = ParseOptions {
            decode_textures: false,
            ..ParseOptions::default()
        };
        let parsed = DidjTexHandler.parse(&MemorySource::new(file), &options).unwrap();
        assert!(parsed.textures.is_empty());
        assert!(!parsed.properties.contains("image"));
    }

    #[test]
    fn test_truncated_header() {
        let file = build_tex(1, 2, 2, &[0u8; 8]);
        let err = DidjTexHandler
            .parse(&MemorySource::new(file[..20].to_vec()), &ParseOptions::default())
            .unwrap_err();
        assert!(err.is_bounds_error());
    }
}
