//! Super Nintendo ROM images
//!
//! The internal header sits at the end of the first ROM bank: 0x7FC0 for
//! LoROM, 0xFFC0 for HiROM. Copier dumps prepend 512 bytes, detected by
//! `len % 1024 == 512`. Any other length that is not a whole number of KiB
//! is a cut-off dump and is rejected. Neither location is marked, so both
//! candidates are scored and the better one wins.
//!
//! The descriptor below starts 16 bytes early to cover the extended header
//! (maker code and game code) used when the old publisher code is 0x33.

use tracing::{debug, trace};

use romscope_core::text::{
    cp1252_sjis_to_utf8, cp1252_to_utf8, is_printable_ascii, shift_jis_to_utf8, trim_nul,
};
use romscope_core::{ByteSource, DecodedStruct, FieldSpec, StructDescriptor};

use crate::traits::{
    Confidence, FormatHandler, ParseError, ParseOptions, ParseResult, ParsedFile, ProbeInfo,
};

/// Copier header length
const COPIER_HEADER: u64 = 512;

/// ROM payloads are whole KiB
const ROM_GRANULE: u64 = 1024;

/// Destination code for Japan; titles there may be Shift-JIS
const DESTINATION_JAPAN: u8 = 0x00;

/// Old publisher code meaning "see the extended header"
const EXTENDED_PUBLISHER: u8 = 0x33;

static HEADER: StructDescriptor = StructDescriptor::new(
    "SNES_RomHeader",
    48,
    &[
        FieldSpec::string("maker_code", 0x00, 2),
        FieldSpec::string("game_code", 0x02, 4),
        FieldSpec::bytes("title_raw", 0x10, 21),
        FieldSpec::u8("map_mode", 0x25),
        FieldSpec::u8("cart_type", 0x26),
        FieldSpec::u8("rom_size", 0x27),
        FieldSpec::u8("sram_size", 0x28),
        FieldSpec::u8("destination", 0x29),
        FieldSpec::u8("old_publisher", 0x2A),
        FieldSpec::u8("version", 0x2B),
        FieldSpec::u16_le("checksum_complement", 0x2C),
        FieldSpec::u16_le("checksum", 0x2E),
    ],
);

/// Where a header candidate was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLocation {
    LoRom,
    HiRom,
}

impl HeaderLocation {
    const ALL: [HeaderLocation; 2] = [HeaderLocation::LoRom, HeaderLocation::HiRom];

    /// Offset of the descriptor (16 bytes before the title)
    fn offset(self) -> u64 {
        match self {
            HeaderLocation::LoRom => 0x7FB0,
            HeaderLocation::HiRom => 0xFFB0,
        }
    }

    /// Map mode low nibbles expected at this location
    fn accepts_mode(self, mode: u8) -> bool {
        match self {
            HeaderLocation::LoRom => matches!(mode, 0x0 | 0x2 | 0x3),
            HeaderLocation::HiRom => matches!(mode, 0x1 | 0x5 | 0xA),
        }
    }
}

/// Decoded internal ROM header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnesHeader {
    pub maker_code: String,
    pub game_code: String,
    pub title: String,
    pub title_raw: Vec<u8>,
    pub map_mode: u8,
    pub cart_type: u8,
    pub rom_size: u8,
    pub sram_size: u8,
    pub destination: u8,
    pub old_publisher: u8,
    pub version: u8,
    pub checksum_complement: u16,
    pub checksum: u16,
}

impl SnesHeader {
    fn from_struct(s: &DecodedStruct<'_>) -> romscope_core::Result<Self> {
        let title_raw = s.bytes("title_raw")?;
        let destination = s.u8("destination")?;
        let title = if destination == DESTINATION_JAPAN {
            cp1252_sjis_to_utf8(title_raw)
        } else {
            cp1252_to_utf8(trim_nul(title_raw))
        };

        Ok(Self {
            maker_code: s.str("maker_code")?.to_string(),
            game_code: s.str("game_code")?.to_string(),
            title: title.trim_end().to_string(),
            title_raw: title_raw.to_vec(),
            map_mode: s.u8("map_mode")?,
            cart_type: s.u8("cart_type")?,
            rom_size: s.u8("rom_size")?,
            sram_size: s.u8("sram_size")?,
            destination,
            old_publisher: s.u8("old_publisher")?,
            version: s.u8("version")?,
            checksum_complement: s.u16("checksum_complement")?,
            checksum: s.u16("checksum")?,
        })
    }

    pub fn checksum_ok(&self) -> bool {
        self.checksum ^ self.checksum_complement == 0xFFFF
    }

    pub fn has_extended_header(&self) -> bool {
        self.old_publisher == EXTENDED_PUBLISHER
    }

    fn map_mode_valid_at(&self, location: HeaderLocation) -> bool {
        self.map_mode & 0xE0 == 0x20 && location.accepts_mode(self.map_mode & 0x0F)
    }

    /// Graded plausibility of this header at `location`, 0..=90
    pub fn score(&self, location: HeaderLocation) -> u8 {
        let mut score = 0;
        if self.checksum_ok() {
            score += 40;
        }

        let other = match location {
            HeaderLocation::LoRom => HeaderLocation::HiRom,
            HeaderLocation::HiRom => HeaderLocation::LoRom,
        };
        if self.map_mode_valid_at(location) {
            score += 25;
        } else if self.map_mode_valid_at(other) {
            score += 10;
        }

        let title = trim_nul(&self.title_raw);
        let readable = is_printable_ascii(title)
            || (self.destination == DESTINATION_JAPAN
                && shift_jis_to_utf8(title).is_some_and(|t| !t.chars().any(char::is_control)));
        if !title.is_empty() && readable {
            score += 15;
        }
        if (8..=13).contains(&self.rom_size) {
            score += 10;
        }
        score
    }

    /// Two-character publisher code
    pub fn publisher_code(&self) -> String {
        if self.has_extended_header() {
            self.maker_code.clone()
        } else {
            format!("{:02X}", self.old_publisher)
        }
    }

    /// Game id from the extended header, if present and readable
    pub fn game_id(&self) -> Option<&str> {
        let code = self.game_code.trim_end();
        (self.has_extended_header() && !code.is_empty() && is_printable_ascii(code.as_bytes()))
            .then_some(code)
    }
}

/// Chosen header candidate
#[derive(Debug, Clone)]
pub struct HeaderMatch {
    pub location: HeaderLocation,
    pub copier_header: bool,
    pub header: SnesHeader,
    pub score: u8,
}

/// Whether a dump of `total_len` bytes starts with a copier header, or
/// `None` when the ROM payload is not a whole number of KiB
fn copier_header_for(total_len: u64) -> Option<bool> {
    match total_len % ROM_GRANULE {
        0 => Some(false),
        COPIER_HEADER => Some(true),
        _ => None,
    }
}

/// Score every candidate location and keep the best.
///
/// `read` returns `Ok(None)` when a candidate lies outside the data.
fn find_header<F>(
    copier_header: bool,
    mut read: F,
) -> romscope_core::Result<Option<HeaderMatch>>
where
    F: FnMut(u64) -> romscope_core::Result<Option<SnesHeader>>,
{
    let base = if copier_header { COPIER_HEADER } else { 0 };

    let mut best: Option<HeaderMatch> = None;
    for location in HeaderLocation::ALL {
        let Some(header) = read(base + location.offset())? else {
            continue;
        };
        let score = header.score(location);
        trace!(?location, score, "snes header candidate");

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(HeaderMatch {
                location,
                copier_header,
                header,
                score,
            });
        }
    }
    Ok(best)
}

/// Human-readable map mode, e.g. "HiROM+FastROM"
pub fn rom_mapping_name(map_mode: u8) -> String {
    let base = match map_mode & 0x0F {
        0x0 => "LoROM",
        0x1 => "HiROM",
        0x2 => "LoROM+S-DD1",
        0x3 => "LoROM+SA-1",
        0x5 => "ExHiROM",
        0xA => "HiROM+SPC7110",
        _ => return format!("Unknown (0x{:02X})", map_mode),
    };
    if map_mode & 0x10 != 0 {
        format!("{}+FastROM", base)
    } else {
        base.to_string()
    }
}

/// Cartridge hardware from the cartridge type byte
pub fn cartridge_hardware(cart_type: u8) -> String {
    let chip = match cart_type >> 4 {
        0x0 => "DSP",
        0x1 => "Super FX",
        0x2 => "OBC1",
        0x3 => "SA-1",
        0x4 => "S-DD1",
        0x5 => "S-RTC",
        0xE => "Other",
        0xF => "Custom Chip",
        _ => "Unknown Chip",
    };
    match cart_type & 0x0F {
        0x0 => "ROM".to_string(),
        0x1 => "ROM, RAM".to_string(),
        0x2 => "ROM, RAM, Battery".to_string(),
        0x3 => format!("ROM, {}", chip),
        0x4 => format!("ROM, RAM, {}", chip),
        0x5 => format!("ROM, RAM, Battery, {}", chip),
        0x6 => format!("ROM, Battery, {}", chip),
        _ => format!("Unknown (0x{:02X})", cart_type),
    }
}

pub fn region_name(destination: u8) -> Option<&'static str> {
    Some(match destination {
        0x00 => "Japan",
        0x01 => "North America",
        0x02 => "Europe",
        0x03 => "Sweden",
        0x04 => "Finland",
        0x05 => "Denmark",
        0x06 => "France",
        0x07 => "Netherlands",
        0x08 => "Spain",
        0x09 => "Germany",
        0x0A => "Italy",
        0x0B => "China",
        0x0D => "South Korea",
        0x0E => "International",
        0x0F => "Canada",
        0x10 => "Brazil",
        0x11 => "Australia",
        _ => return None,
    })
}

/// Size in bytes of a `log2(KiB)` size field
fn size_from_log2_kib(value: u8) -> Option<u64> {
    (value <= 16).then(|| 1024u64 << value)
}

/// Handler for headered and headerless SNES ROM dumps
#[derive(Debug, Default, Clone, Copy)]
pub struct SnesHandler;

impl FormatHandler for SnesHandler {
    fn id(&self) -> &'static str {
        "snes"
    }

    fn name(&self) -> &'static str {
        "Super Nintendo ROM Image"
    }

    fn description(&self) -> &'static str {
        "LoROM and HiROM cartridge dumps, with or without a copier header"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["sfc", "smc", "swc", "fig"]
    }

    fn recognize(&self, probe: &ProbeInfo) -> Confidence {
        let Some(copier_header) = copier_header_for(probe.total_len) else {
            return Confidence::NONE;
        };
        let found = find_header(copier_header, |offset| {
            let Ok(offset) = usize::try_from(offset) else {
                return Ok(None);
            };
            match HEADER.decode_bytes(&probe.prefix, offset) {
                Ok(s) => SnesHeader::from_struct(&s).map(Some),
                Err(_) => Ok(None),
            }
        });

        match found {
            Ok(Some(found)) => {
                let bonus = if probe.has_extension(self.extensions()) { 10 } else { 0 };
                Confidence::new(found.score + bonus)
            }
            _ => Confidence::NONE,
        }
    }

    fn parse(&self, source: &dyn ByteSource, options: &ParseOptions) -> ParseResult<ParsedFile> {
        let total_len = source.len();
        let copier_header = copier_header_for(total_len).ok_or_else(|| {
            ParseError::InvalidStructure(format!(
                "{} bytes is not a whole number of KiB, with or without a copier header",
                total_len
            ))
        })?;

        let found = find_header(copier_header, |offset| match HEADER.decode(source, offset) {
            Ok(s) => SnesHeader::from_struct(&s).map(Some),
            Err(e) if e.is_bounds_error() => Ok(None),
            Err(e) => Err(e),
        })?
        .ok_or_else(|| ParseError::InvalidStructure("file too small for a SNES header".into()))?;

        let header = &found.header;
        debug!(
            location = ?found.location,
            copier_header = found.copier_header,
            score = found.score,
            "snes header selected"
        );

        if options.strict_validation && !header.checksum_ok() {
            return Err(ParseError::InvalidStructure(format!(
                "checksum 0x{:04X} does not match complement 0x{:04X}",
                header.checksum, header.checksum_complement
            )));
        }

        let mut parsed = ParsedFile::new(self.id());
        let props = &mut parsed.properties;
        props.set("title", header.title.as_str());
        if let Some(game_id) = header.game_id() {
            props.set("game_id", game_id);
        }
        props.set("publisher", header.publisher_code());
        props.set("rom_mapping", rom_mapping_name(header.map_mode));
        props.set("cartridge_hardware", cartridge_hardware(header.cart_type));
        if let Some(size) = size_from_log2_kib(header.rom_size) {
            props.set("rom_size", size);
        }
        match header.sram_size {
            0 => props.set("sram_size", 0u64),
            n => {
                if let Some(size) = size_from_log2_kib(n) {
                    props.set("sram_size", size);
                }
            }
        }
        props.set(
            "region",
            match region_name(header.destination) {
                Some(name) => name.to_string(),
                None => format!("Unknown (0x{:02X})", header.destination),
            },
        );
        props.set("revision", format!("1.{}", header.version));
        props.set("checksum", u32::from(header.checksum));
        props.set("copier_header", if found.copier_header { "yes" } else { "no" });

        Ok(parsed)
    }
}
