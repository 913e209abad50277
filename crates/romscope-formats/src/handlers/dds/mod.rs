//! DDS (DirectDraw Surface) textures
//!
//! Layout: `"DDS "`, a 124-byte header, an optional 20-byte DX10 header when
//! the FourCC is `DX10`, then every surface's mip chain back to back. Only
//! the top level of the first surface is decoded.

mod format;
mod header;

pub use format::{DxgiFormat, TextureFormat};
pub use header::{DdsHeader, Dx10Header, PixelFormat};

use tracing::debug;

use romscope_core::ByteSource;
use romscope_texture::PixelFormatDescriptor;

use crate::traits::{
    Confidence, FormatHandler, ParseError, ParseOptions, ParseResult, ParsedFile, ProbeInfo,
};
use header::{BASE_HEADER_LEN, DX10_HEADER_LEN, HEADER_SIZE};

/// A u32 dimension halves to 1 in at most 32 steps
const MAX_MIP_LEVELS: u32 = 32;

/// Bytes needed for every level of every surface, `None` on overflow
fn total_data_size(
    header: &DdsHeader,
    format: TextureFormat,
    surfaces: u64,
) -> Option<u64> {
    let mut width = header.width;
    let mut height = header.height;
    let mut depth = if header.is_volume() { header.depth.max(1) } else { 1 };

    let mut chain = 0u64;
    for _ in 0..header.mip_levels() {
        let level = format
            .level_size(width, height)?
            .checked_mul(u64::from(depth))?;
        chain = chain.checked_add(level)?;

        width = (width / 2).max(1);
        height = (height / 2).max(1);
        depth = (depth / 2).max(1);
    }
    chain.checked_mul(surfaces)
}

/// Handler for `.dds` files
#[derive(Debug, Default, Clone, Copy)]
pub struct DdsHandler;

impl FormatHandler for DdsHandler {
    fn id(&self) -> &'static str {
        "dds"
    }

    fn name(&self) -> &'static str {
        "DirectDraw Surface"
    }

    fn description(&self) -> &'static str {
        "DDS textures with legacy or DX10 headers"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dds"]
    }

    fn recognize(&self, probe: &ProbeInfo) -> Confidence {
        if !probe.starts_with(b"DDS ") {
            return Confidence::NONE;
        }
        match DdsHeader::from_bytes(&probe.prefix) {
            Ok(header) if header.size == HEADER_SIZE => {
                if probe.has_extension(self.extensions()) {
                    Confidence::CERTAIN
                } else {
                    Confidence::new(95)
                }
            }
            _ => Confidence::NONE,
        }
    }

    fn parse(&self, source: &dyn ByteSource, options: &ParseOptions) -> ParseResult<ParsedFile> {
        let header = DdsHeader::read(source)?;
        let dx10 = if header.has_dx10_header() {
            Some(Dx10Header::read(source)?)
        } else {
            None
        };
        let data_offset = BASE_HEADER_LEN + if dx10.is_some() { DX10_HEADER_LEN } else { 0 };

        if header.width == 0 || header.height == 0 {
            return Err(ParseError::InvalidStructure(format!(
                "zero texture dimensions {}x{}",
                header.width, header.height
            )));
        }
        if header.mip_levels() > MAX_MIP_LEVELS {
            return Err(ParseError::InvalidStructure(format!(
                "{} mip levels",
                header.mipmap_count
            )));
        }

        let format = TextureFormat::from_header(&header, dx10.as_ref());
        let cubemap = header.is_cubemap() || dx10.as_ref().is_some_and(Dx10Header::is_cubemap);
        let array_size = dx10.as_ref().map_or(1, |d| d.array_size.max(1));
        let faces = match (cubemap, &dx10) {
            (false, _) => 1,
            (true, Some(_)) => 6,
            (true, None) => header.cube_faces(),
        };
        debug!(
            width = header.width,
            height = header.height,
            ?format,
            mips = header.mip_levels(),
            faces,
            array_size,
            "dds header"
        );

        // Every declared level must be present
        let data_len = source.len().saturating_sub(data_offset);
        if format != TextureFormat::Unknown {
            let surfaces = u64::from(faces) * u64::from(array_size);
            match total_data_size(&header, format, surfaces) {
                Some(needed) if needed <= data_len => {}
                needed => {
                    return Err(romscope_core::Error::OutOfRange {
                        offset: data_offset,
                        length: needed.unwrap_or(u64::MAX),
                        size: source.len(),
                    }
                    .into())
                }
            }
        }

        let mut parsed = ParsedFile::new(self.id());
        let props = &mut parsed.properties;
        props.set("width", header.width);
        props.set("height", header.height);
        if header.is_volume() {
            props.set("depth", header.depth);
        }
        props.set("mipmap_count", header.mip_levels());
        props.set("texture_format", format.name());
        if let Some(dx10) = &dx10 {
            props.set("dxgi_format", dx10.dxgi_format);
            props.set("array_size", array_size);
        } else if header.pixel_format.has_fourcc() {
            props.set("fourcc", header.pixel_format.fourcc_string());
        }
        props.set("cubemap", if cubemap { "yes" } else { "no" });

        match format.encoding() {
            Some(encoding) if options.decode_textures => {
                let desc = PixelFormatDescriptor::new(header.width, header.height, encoding);
                let len = options.check_alloc(desc.expected_len()? as u64)?;
                let data = source.read(data_offset, len)?;
                let texture = options
                    .texture_decoder()
                    .decode(&desc, &data, None)
                    .map_err(|e| ParseError::from(e).with_context("decoding DDS top level"))?;
                let bitmap = parsed.add_texture(texture);
                parsed.properties.set("image", bitmap);
            }
            Some(_) => {}
            None => debug!(format = %format.name(), "no decoder for DDS format, no image"),
        }

        Ok(parsed)
    }
}
