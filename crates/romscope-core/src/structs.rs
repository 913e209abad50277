//! Declarative struct reader
//!
//! Binary records are described by a static [`StructDescriptor`] instead of
//! relying on in-memory layout. Decoding applies every field transform
//! (byte order, sign/zero extension, NUL truncation) in one pass over exactly
//! `descriptor.size()` bytes and either returns a complete [`DecodedStruct`]
//! or an error; a partially populated struct is never observable.
//!
//! ```
//! use romscope_core::structs::{FieldSpec, StructDescriptor};
//!
//! static HEADER: StructDescriptor = StructDescriptor::new("Header", 8, &[
//!     FieldSpec::u32_le("magic", 0x0),
//!     FieldSpec::u16_be("version", 0x4),
//! ]);
//!
//! let decoded = HEADER.decode_bytes(&[1, 0, 0, 0, 0x01, 0x02, 0, 0], 0).unwrap();
//! assert_eq!(decoded.u32("magic").unwrap(), 1);
//! assert_eq!(decoded.u16("version").unwrap(), 0x0102);
//! ```

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::source::{check_range, ByteSource};
use crate::text::{cp1252_to_utf8, trim_nul};

/// Byte order of a multi-byte field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Encoding of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    U16(Endian),
    I16(Endian),
    U32(Endian),
    I32(Endian),
    U64(Endian),
    I64(Endian),
    /// Fixed-size raw byte array
    Bytes(usize),
    /// Fixed-size Windows-1252 string, truncated at the first NUL
    Str(usize),
}

impl FieldKind {
    /// Width of the field in bytes
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::I8 => 1,
            FieldKind::U16(_) | FieldKind::I16(_) => 2,
            FieldKind::U32(_) | FieldKind::I32(_) => 4,
            FieldKind::U64(_) | FieldKind::I64(_) => 8,
            FieldKind::Bytes(n) | FieldKind::Str(n) => n,
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            FieldKind::U8 => "u8",
            FieldKind::I8 => "i8",
            FieldKind::U16(_) => "u16",
            FieldKind::I16(_) => "i16",
            FieldKind::U32(_) => "u32",
            FieldKind::I32(_) => "i32",
            FieldKind::U64(_) => "u64",
            FieldKind::I64(_) => "i64",
            FieldKind::Bytes(_) => "bytes",
            FieldKind::Str(_) => "string",
        }
    }
}

/// One field of a record: name, offset from the record start, and encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, offset: usize, kind: FieldKind) -> Self {
        Self { name, offset, kind }
    }

    pub const fn u8(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, FieldKind::U8)
    }

    pub const fn u16_le(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, FieldKind::U16(Endian::Little))
    }

    pub const fn u16_be(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, FieldKind::U16(Endian::Big))
    }

    pub const fn u32_le(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, FieldKind::U32(Endian::Little))
    }

    pub const fn u32_be(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, FieldKind::U32(Endian::Big))
    }

    pub const fn u64_le(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, FieldKind::U64(Endian::Little))
    }

    pub const fn u64_be(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, FieldKind::U64(Endian::Big))
    }

    pub const fn i32_le(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, FieldKind::I32(Endian::Little))
    }

    pub const fn i32_be(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, FieldKind::I32(Endian::Big))
    }

    pub const fn bytes(name: &'static str, offset: usize, len: usize) -> Self {
        Self::new(name, offset, FieldKind::Bytes(len))
    }

    pub const fn string(name: &'static str, offset: usize, len: usize) -> Self {
        Self::new(name, offset, FieldKind::Str(len))
    }
}

/// Static description of a packed binary record
#[derive(Debug)]
pub struct StructDescriptor {
    name: &'static str,
    size: usize,
    fields: &'static [FieldSpec],
}

impl StructDescriptor {
    /// Define a record layout.
    ///
    /// # Panics
    ///
    /// Panics (at compile time when used in a `static` or `const`) if any
    /// field extends past `size`.
    pub const fn new(name: &'static str, size: usize, fields: &'static [FieldSpec]) -> Self {
        let mut i = 0;
        while i < fields.len() {
            let field = &fields[i];
            assert!(
                field.offset + field.kind.width() <= size,
                "struct field extends past the declared struct size"
            );
            i += 1;
        }
        Self { name, size, fields }
    }

    /// Record name, used in error messages
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Declared record size in bytes
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Field layout
    pub const fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Decode the record located at `offset` in `source`
    pub fn decode<S: ByteSource + ?Sized>(&self, source: &S, offset: u64) -> Result<DecodedStruct<'_>> {
        decode(self, source, offset)
    }

    /// Decode the record located at `offset` in an in-memory buffer
    pub fn decode_bytes(&self, bytes: &[u8], offset: usize) -> Result<DecodedStruct<'_>> {
        let end = offset.checked_add(self.size);
        match end {
            Some(end) if end <= bytes.len() => Ok(self.decode_exact(&bytes[offset..end])),
            _ => Err(self.bounds_error(offset as u64, (bytes.len() as u64).saturating_sub(offset as u64))),
        }
    }

    fn bounds_error(&self, offset: u64, available: u64) -> Error {
        Error::Bounds {
            name: self.name,
            offset,
            needed: self.size,
            available,
        }
    }

    /// Decode from a buffer holding exactly `self.size` bytes
    fn decode_exact(&self, raw: &[u8]) -> DecodedStruct<'_> {
        debug_assert_eq!(raw.len(), self.size);

        let values = self
            .fields
            .iter()
            .map(|field| {
                let bytes = &raw[field.offset..field.offset + field.kind.width()];
                decode_field(field.kind, bytes)
            })
            .collect();

        DecodedStruct {
            descriptor: self,
            values,
        }
    }
}

fn decode_field(kind: FieldKind, bytes: &[u8]) -> FieldValue {
    match kind {
        FieldKind::U8 => FieldValue::Unsigned(u64::from(bytes[0])),
        FieldKind::I8 => FieldValue::Signed(i64::from(bytes[0] as i8)),
        FieldKind::U16(e) => FieldValue::Unsigned(u64::from(match e {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        })),
        FieldKind::I16(e) => FieldValue::Signed(i64::from(match e {
            Endian::Little => LittleEndian::read_i16(bytes),
            Endian::Big => BigEndian::read_i16(bytes),
        })),
        FieldKind::U32(e) => FieldValue::Unsigned(u64::from(match e {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        })),
        FieldKind::I32(e) => FieldValue::Signed(i64::from(match e {
            Endian::Little => LittleEndian::read_i32(bytes),
            Endian::Big => BigEndian::read_i32(bytes),
        })),
        FieldKind::U64(e) => FieldValue::Unsigned(match e {
            Endian::Little => LittleEndian::read_u64(bytes),
            Endian::Big => BigEndian::read_u64(bytes),
        }),
        FieldKind::I64(e) => FieldValue::Signed(match e {
            Endian::Little => LittleEndian::read_i64(bytes),
            Endian::Big => BigEndian::read_i64(bytes),
        }),
        FieldKind::Bytes(_) => FieldValue::Bytes(bytes.to_vec()),
        FieldKind::Str(_) => FieldValue::Text(cp1252_to_utf8(trim_nul(bytes))),
    }
}

/// Decode `descriptor` at `offset` in `source`.
///
/// Reads exactly `descriptor.size()` bytes; fails with [`Error::Bounds`] if the
/// record would extend past the declared length of the source.
pub fn decode<'d, S: ByteSource + ?Sized>(
    descriptor: &'d StructDescriptor,
    source: &S,
    offset: u64,
) -> Result<DecodedStruct<'d>> {
    let size = descriptor.size as u64;
    if check_range(offset, size, source.len()).is_err() {
        return Err(descriptor.bounds_error(offset, source.len().saturating_sub(offset)));
    }

    let mut raw: SmallVec<[u8; 256]> = SmallVec::from_elem(0, descriptor.size);
    source.read_at(offset, &mut raw)?;
    Ok(descriptor.decode_exact(&raw))
}

/// Typed value of a decoded field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Bytes(Vec<u8>),
    Text(String),
}

/// Result of applying a [`StructDescriptor`] to a byte range
#[derive(Debug, Clone)]
pub struct DecodedStruct<'d> {
    descriptor: &'d StructDescriptor,
    values: SmallVec<[FieldValue; 16]>,
}

impl<'d> DecodedStruct<'d> {
    /// Descriptor this struct was decoded with
    pub fn descriptor(&self) -> &'d StructDescriptor {
        self.descriptor
    }

    /// Look up a field value by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.descriptor
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|idx| &self.values[idx])
    }

    /// Iterate over `(name, value)` pairs in descriptor order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> + '_ {
        self.descriptor.fields.iter().map(|f| f.name).zip(self.values.iter())
    }

    fn field(&self, name: &str) -> Result<(&'static FieldSpec, &FieldValue)> {
        self.descriptor
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|idx| (&self.descriptor.fields[idx], &self.values[idx]))
            .ok_or_else(|| Error::FieldNotFound {
                name: self.descriptor.name,
                field: name.to_string(),
            })
    }

    fn type_error(spec: &FieldSpec, requested: &'static str) -> Error {
        Error::FieldType {
            field: spec.name,
            actual: spec.kind.type_name(),
            requested,
        }
    }

    fn unsigned_as<T: TryFrom<u64>>(&self, name: &str, requested: &'static str) -> Result<T> {
        let (spec, value) = self.field(name)?;
        match value {
            FieldValue::Unsigned(v) => T::try_from(*v).map_err(|_| Self::type_error(spec, requested)),
            _ => Err(Self::type_error(spec, requested)),
        }
    }

    pub fn u8(&self, name: &str) -> Result<u8> {
        self.unsigned_as(name, "u8")
    }

    pub fn u16(&self, name: &str) -> Result<u16> {
        self.unsigned_as(name, "u16")
    }

    pub fn u32(&self, name: &str) -> Result<u32> {
        self.unsigned_as(name, "u32")
    }

    pub fn u64(&self, name: &str) -> Result<u64> {
        self.unsigned_as(name, "u64")
    }

    pub fn i64(&self, name: &str) -> Result<i64> {
        let (spec, value) = self.field(name)?;
        match value {
            FieldValue::Signed(v) => Ok(*v),
            _ => Err(Self::type_error(spec, "i64")),
        }
    }

    pub fn i32(&self, name: &str) -> Result<i32> {
        let (spec, _) = self.field(name)?;
        i32::try_from(self.i64(name)?).map_err(|_| Self::type_error(spec, "i32"))
    }

    pub fn bytes(&self, name: &str) -> Result<&[u8]> {
        let (spec, value) = self.field(name)?;
        match value {
            FieldValue::Bytes(b) => Ok(b),
            _ => Err(Self::type_error(spec, "bytes")),
        }
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        let (spec, value) = self.field(name)?;
        match value {
            FieldValue::Text(s) => Ok(s),
            _ => Err(Self::type_error(spec, "string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use proptest::prelude::*;

    static SAMPLE: StructDescriptor = StructDescriptor::new(
        "Sample",
        24,
        &[
            FieldSpec::u32_le("le32", 0x00),
            FieldSpec::u32_be("be32", 0x04),
            FieldSpec::u16_le("le16", 0x08),
            FieldSpec::new("signed", 0x0A, FieldKind::I16(Endian::Big)),
            FieldSpec::bytes("raw", 0x0C, 4),
            FieldSpec::string("name", 0x10, 8),
        ],
    );

    fn sample_bytes() -> Vec<u8> {
        let mut data = vec![
            0x78, 0x56, 0x34, 0x12, // le32
            0x12, 0x34, 0x56, 0x78, // be32
            0x34, 0x12, // le16
            0xFF, 0xFE, // signed (-2)
            0xDE, 0xAD, 0xBE, 0xEF, // raw
        ];
        data.extend_from_slice(b"ROM\0JUNK");
        data
    }

    #[test]
    fn test_decode_all_field_kinds() {
        let data = sample_bytes();
        let decoded = SAMPLE.decode_bytes(&data, 0).unwrap();

        assert_eq!(decoded.u32("le32").unwrap(), 0x1234_5678);
        assert_eq!(decoded.u32("be32").unwrap(), 0x1234_5678);
        assert_eq!(decoded.u16("le16").unwrap(), 0x1234);
        assert_eq!(decoded.i64("signed").unwrap(), -2);
        assert_eq!(decoded.bytes("raw").unwrap(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(decoded.str("name").unwrap(), "ROM");
    }

    #[test]
    fn test_decode_from_source_at_offset() {
        let mut data = vec![0u8; 5];
        data.extend(sample_bytes());
        let source = MemorySource::new(data);

        let decoded = decode(&SAMPLE, &source, 5).unwrap();
        assert_eq!(decoded.u32("be32").unwrap(), 0x1234_5678);
        assert_eq!(decoded.iter().count(), 6);
    }

    #[test]
    fn test_short_range_is_bounds_error() {
        let data = sample_bytes();
        let source = MemorySource::new(data[..23].to_vec());

        match decode(&SAMPLE, &source, 0) {
            Err(Error::Bounds { name, needed, available, .. }) => {
                assert_eq!(name, "Sample");
                assert_eq!(needed, 24);
                assert_eq!(available, 23);
            }
            other => panic!("Expected Bounds error, got {:?}", other),
        }
    }

    #[test]
    fn test_offset_overflow_is_bounds_error() {
        let source = MemorySource::new(sample_bytes());
        assert!(matches!(decode(&SAMPLE, &source, u64::MAX), Err(Error::Bounds { .. })));
        assert!(matches!(SAMPLE.decode_bytes(&sample_bytes(), usize::MAX), Err(Error::Bounds { .. })));
    }

    #[test]
    fn test_field_errors() {
        let decoded = SAMPLE.decode_bytes(&sample_bytes(), 0).unwrap();

        assert!(matches!(decoded.u32("missing"), Err(Error::FieldNotFound { .. })));
        assert!(matches!(decoded.str("le32"), Err(Error::FieldType { requested: "string", .. })));
        // 0x12345678 does not fit in a u16
        assert!(matches!(decoded.u16("le32"), Err(Error::FieldType { actual: "u32", .. })));
    }

    proptest! {
        #[test]
        fn prop_short_ranges_never_decode(len in 0usize..24, fill in any::<u8>()) {
            let source = MemorySource::new(vec![fill; len]);
            let result = decode(&SAMPLE, &source, 0);
            let is_bounds = matches!(result, Err(Error::Bounds { .. }));
            prop_assert!(is_bounds);
        }

        #[test]
        fn prop_window_past_end_never_decodes(extra in 0usize..64, offset in 1u64..128) {
            let source = MemorySource::new(vec![0u8; 24 + extra]);
            let result = decode(&SAMPLE, &source, offset);
            if offset as usize + 24 <= 24 + extra {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.unwrap_err().is_bounds_error());
            }
        }
    }
}
