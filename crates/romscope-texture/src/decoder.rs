//! Texture decode pipeline
//!
//! 1. Undo the descriptor's compression, if any.
//! 2. Require the pixel data to be exactly [`PixelFormatDescriptor::expected_len`] bytes.
//! 3. Unpack direct, indexed or block-compressed pixels.
//! 4. Emit a [`CanonicalBitmap`] at the stored size.

use tracing::{debug, trace};

use crate::bitmap::{CanonicalBitmap, Rgba};
use crate::decompress::decompress;
use crate::error::{TextureError, TextureResult};
use crate::format::{BlockFormat, DirectFormat, NibbleOrder, PixelEncoding, PixelFormatDescriptor};
use crate::pixel::decode_pixel;

/// Default cap on both decompressed input and decoded output (64 MiB)
pub const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// A decoded image plus the size it is meant to be displayed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    pub bitmap: CanonicalBitmap,
    pub display_width: u32,
    pub display_height: u32,
}

impl DecodedTexture {
    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }
}

/// Texture decoder with an allocation limit
#[derive(Debug, Clone, Copy)]
pub struct TextureDecoder {
    max_bytes: usize,
}

impl Default for TextureDecoder {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl TextureDecoder {
    /// Create a decoder that refuses buffers larger than `max_bytes`
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Decode `raw` (and `palette` for indexed encodings) into RGBA
    pub fn decode(
        &self,
        desc: &PixelFormatDescriptor,
        raw: &[u8],
        palette: Option<&[u8]>,
    ) -> TextureResult<DecodedTexture> {
        desc.check_dimensions()?;

        let expected = desc.expected_len()?;
        let output_bytes = desc.pixel_count().saturating_mul(4);
        if output_bytes > self.max_bytes as u64 {
            return Err(TextureError::TooLarge {
                needed: output_bytes,
                limit: self.max_bytes as u64,
            });
        }

        let decompressed;
        let data = match desc.compression {
            Some(method) => {
                decompressed = decompress(method, raw, expected, self.max_bytes)?;
                decompressed.as_slice()
            }
            None => raw,
        };

        if data.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        trace!(
            width = desc.width,
            height = desc.height,
            encoding = ?desc.encoding,
            "decoding texture"
        );

        let pixels = match desc.encoding {
            PixelEncoding::Direct(format) => decode_direct(desc, format, data),
            PixelEncoding::Ci8 { palette: format } => {
                let palette = Palette::new(desc, format, palette)?;
                decode_ci8(&palette, data)?
            }
            PixelEncoding::Ci4 {
                palette: format,
                nibble,
            } => {
                let palette = Palette::new(desc, format, palette)?;
                decode_ci4(desc, &palette, nibble, data)?
            }
            PixelEncoding::Block(format) => decode_block(desc, format, data),
        };

        let bitmap = CanonicalBitmap::new(desc.width, desc.height, pixels)?;
        debug!(width = desc.width, height = desc.height, "texture decoded");

        Ok(DecodedTexture {
            bitmap,
            display_width: desc.display_width,
            display_height: desc.display_height,
        })
    }
}

/// Decode with the default limits
pub fn decode(
    desc: &PixelFormatDescriptor,
    raw: &[u8],
    palette: Option<&[u8]>,
) -> TextureResult<DecodedTexture> {
    TextureDecoder::default().decode(desc, raw, palette)
}

fn decode_direct(desc: &PixelFormatDescriptor, format: DirectFormat, data: &[u8]) -> Vec<Rgba> {
    data.chunks_exact(format.bytes_per_pixel())
        .map(|px| decode_pixel(format, px, desc.byte_order))
        .collect()
}

/// Palette converted up front; lookups are bounds-checked
struct Palette {
    entries: Vec<Rgba>,
}

impl Palette {
    fn new(
        desc: &PixelFormatDescriptor,
        format: DirectFormat,
        bytes: Option<&[u8]>,
    ) -> TextureResult<Self> {
        let bytes = bytes.ok_or(TextureError::MissingPalette)?;
        let entry_size = format.bytes_per_pixel();
        let count = (bytes.len() / entry_size).min(desc.encoding.max_palette_entries());

        let entries = bytes
            .chunks_exact(entry_size)
            .take(count)
            .map(|px| decode_pixel(format, px, desc.byte_order))
            .collect();
        Ok(Self { entries })
    }

    #[inline]
    fn lookup(&self, index: usize) -> TextureResult<Rgba> {
        self.entries
            .get(index)
            .copied()
            .ok_or(TextureError::PaletteOutOfRange {
                index,
                entries: self.entries.len(),
            })
    }
}

fn decode_ci8(palette: &Palette, data: &[u8]) -> TextureResult<Vec<Rgba>> {
    data.iter().map(|&i| palette.lookup(i as usize)).collect()
}

fn decode_ci4(
    desc: &PixelFormatDescriptor,
    palette: &Palette,
    nibble: NibbleOrder,
    data: &[u8],
) -> TextureResult<Vec<Rgba>> {
    let width = desc.width as usize;
    let stride = width.div_ceil(2);
    let mut pixels = Vec::with_capacity(width * desc.height as usize);

    for row in data.chunks_exact(stride) {
        for x in 0..width {
            let byte = row[x / 2];
            let first = x % 2 == 0;
            let index = match (nibble, first) {
                (NibbleOrder::LowFirst, true) | (NibbleOrder::HighFirst, false) => byte & 0x0F,
                (NibbleOrder::LowFirst, false) | (NibbleOrder::HighFirst, true) => byte >> 4,
            };
            pixels.push(palette.lookup(index as usize)?);
        }
    }
    Ok(pixels)
}

fn decode_block(desc: &PixelFormatDescriptor, format: BlockFormat, data: &[u8]) -> Vec<Rgba> {
    let mut pixels = vec![Rgba::default(); desc.pixel_count() as usize];
    format.texpresso().decompress(
        data,
        desc.width as usize,
        desc.height as usize,
        bytemuck::cast_slice_mut(&mut pixels),
    );
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Compression;
    use std::io::Write;

    fn rgb565(width: u32, height: u32) -> PixelFormatDescriptor {
        PixelFormatDescriptor::new(width, height, PixelEncoding::Direct(DirectFormat::Rgb565))
    }

    #[test]
    fn test_rgb565_2x2() {
        let raw = [0x00, 0xF8, 0xE0, 0x07, 0x1F, 0x00, 0xFF, 0xFF];
        let texture = decode(&rgb565(2, 2), &raw, None).unwrap();

        let pixels = texture.bitmap.pixels();
        assert_eq!(pixels[0], Rgba::new(255, 0, 0, 255));
        assert_eq!(pixels[1], Rgba::new(0, 255, 0, 255));
        assert_eq!(pixels[2], Rgba::new(0, 0, 255, 255));
        assert_eq!(pixels[3], Rgba::new(255, 255, 255, 255));
    }

    #[test]
    fn test_size_mismatch() {
        for len in [7usize, 9] {
            assert!(matches!(
                decode(&rgb565(2, 2), &vec![0u8; len], None),
                Err(TextureError::SizeMismatch { expected: 8, .. })
            ));
        }
    }

    #[test]
    fn test_palette_bounds() {
        let desc = PixelFormatDescriptor::new(
            2,
            1,
            PixelEncoding::Ci8 { palette: DirectFormat::Rgb565 },
        );
        // Four palette entries
        let palette = [0x00, 0xF8, 0xE0, 0x07, 0x1F, 0x00, 0xFF, 0xFF];

        let ok = decode(&desc, &[0, 3], Some(&palette)).unwrap();
        assert_eq!(ok.bitmap.pixels()[1], Rgba::new(255, 255, 255, 255));

        assert!(matches!(
            decode(&desc, &[0, 4], Some(&palette)),
            Err(TextureError::PaletteOutOfRange { index: 4, entries: 4 })
        ));
        assert!(matches!(decode(&desc, &[0, 0], None), Err(TextureError::MissingPalette)));
    }

    #[test]
    fn test_ci4_nibble_order_and_padding() {
        let palette = [0x00, 0x00, 0x00, 0xF8]; // black, red
        let low_first = PixelFormatDescriptor::new(
            3,
            1,
            PixelEncoding::Ci4 { palette: DirectFormat::Rgb565, nibble: NibbleOrder::LowFirst },
        );
        // Row stride is 2 bytes for 3 pixels
        let texture = decode(&low_first, &[0x01, 0x01], Some(&palette)).unwrap();
        let red = Rgba::new(255, 0, 0, 255);
        let black = Rgba::new(0, 0, 0, 255);
        assert_eq!(texture.bitmap.pixels(), &[red, black, red]);

        let high_first = PixelFormatDescriptor {
            encoding: PixelEncoding::Ci4 { palette: DirectFormat::Rgb565, nibble: NibbleOrder::HighFirst },
            ..low_first
        };
        let texture = decode(&high_first, &[0x01, 0x10], Some(&palette)).unwrap();
        assert_eq!(texture.bitmap.pixels(), &[black, red, red]);
    }

    #[test]
    fn test_compressed_payload() {
        let raw: Vec<u8> = [0x00u8, 0xF8].repeat(16);
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        let desc = rgb565(4, 4).with_compression(Compression::Zlib).with_display_size(3, 3);
        let texture = decode(&desc, &compressed, None).unwrap();
        assert_eq!((texture.width(), texture.height()), (4, 4));
        assert_eq!((texture.display_width, texture.display_height), (3, 3));
        assert!(texture.bitmap.pixels().iter().all(|p| *p == Rgba::new(255, 0, 0, 255)));
    }

    #[test]
    fn test_compressed_payload_of_wrong_length() {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&[0x00, 0xF8, 0x00, 0xF8, 0x00, 0xF8]).unwrap();
        let compressed = encoder.finish().unwrap();

        let desc = rgb565(2, 2).with_compression(Compression::Zlib);
        assert!(matches!(
            decode(&desc, &compressed, None),
            Err(TextureError::SizeMismatch { expected: 8, actual: 6 })
        ));

        // Garbage is still a decompression error
        assert!(matches!(
            decode(&desc, &[0xDE, 0xAD, 0xBE, 0xEF], None),
            Err(TextureError::DecompressionError(_))
        ));
    }

    #[test]
    fn test_output_limit() {
        let decoder = TextureDecoder::new(1024);
        let desc = rgb565(64, 64);
        assert!(matches!(
            decoder.decode(&desc, &vec![0u8; 64 * 64 * 2], None),
            Err(TextureError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_bc1_solid_block() {
        // color0 = color1 = pure red, all indices 0
        let block = [0x00, 0xF8, 0x00, 0xF8, 0, 0, 0, 0];
        let desc = PixelFormatDescriptor::new(4, 4, PixelEncoding::Block(BlockFormat::Bc1));
        let texture = decode(&desc, &block, None).unwrap();
        assert!(texture.bitmap.pixels().iter().all(|p| *p == Rgba::new(255, 0, 0, 255)));
    }
}
