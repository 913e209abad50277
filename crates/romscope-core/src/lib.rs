//! romscope Core Library
//!
//! This crate provides the format-agnostic foundations shared by every
//! romscope component:
//! - [`source`]: bounds-checked random-access byte sources
//! - [`structs`]: declarative, endian-tagged record decoding
//! - [`property`]: the ordered metadata model handed to hosts
//! - [`text`]: code page helpers for fixed-size string fields

pub mod error;
pub mod property;
pub mod source;
pub mod structs;
pub mod text;

pub use error::{Error, Result, ResultExt};
pub use property::{BitmapRef, PropertyModel, PropertyValue};
pub use source::{
    open_path, ByteSource, FileSource, MemorySource, MmapSource, SourceCursor, SubSource,
};
pub use structs::{DecodedStruct, Endian, FieldKind, FieldSpec, FieldValue, StructDescriptor};

/// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::property::{PropertyModel, PropertyValue};
    pub use crate::source::ByteSource;
    pub use crate::structs::{Endian, FieldSpec, StructDescriptor};
}
