//! Core traits defining the handler interface for all container formats.
//!
//! A [`FormatHandler`] is a `(recognize, parse)` pair: `recognize` scores a
//! probe (the first bytes of a source plus its length and extension) and
//! `parse` turns a whole [`ByteSource`] into a [`ParsedFile`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use romscope_core::{BitmapRef, ByteSource, PropertyModel};
use romscope_crypto::CipherError;
use romscope_texture::{DecodedTexture, TextureDecoder, TextureError};

/// Errors that can occur inside a format handler
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid magic bytes: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: Vec<u8>, found: Vec<u8> },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Source error: {0}")]
    Source(#[from] romscope_core::Error),

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the input ended before a required structure
    pub fn is_bounds_error(&self) -> bool {
        match self {
            ParseError::Source(e) => e.is_bounds_error(),
            ParseError::Nested { source, .. } => source.is_bounds_error(),
            _ => false,
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Configuration options for parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Number of leading bytes handed to `recognize`
    pub probe_size: usize,
    /// Whether handlers decode embedded images
    pub decode_textures: bool,
    /// Upper bound for any buffer sized from a field in the file
    pub max_texture_bytes: usize,
    /// Whether to use memory mapping for large files
    pub use_memory_mapping: bool,
    /// Minimum file size to enable memory mapping
    pub memory_mapping_threshold: u64,
    /// Reject files with soft inconsistencies (bad checksums, odd padding)
    pub strict_validation: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            probe_size: 0x10200,
            decode_textures: true,
            max_texture_bytes: 64 * 1024 * 1024, // 64 MB
            use_memory_mapping: true,
            memory_mapping_threshold: 16 * 1024 * 1024, // 16 MB
            strict_validation: false,
        }
    }
}

impl ParseOptions {
    /// Parse options from YAML; missing keys take their defaults
    pub fn from_yaml(text: &str) -> ParseResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load options from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ParseResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(romscope_core::Error::from)?;
        Self::from_yaml(&text)
    }

    /// Texture decoder honouring `max_texture_bytes`
    pub fn texture_decoder(&self) -> TextureDecoder {
        TextureDecoder::new(self.max_texture_bytes)
    }

    /// Open a file as a byte source, memory mapping it above the threshold
    pub fn open(&self, path: impl AsRef<Path>) -> ParseResult<Box<dyn ByteSource>> {
        let threshold = self.use_memory_mapping.then_some(self.memory_mapping_threshold);
        Ok(romscope_core::open_path(path, threshold)?)
    }

    /// Fail with `TooLarge` if `needed` exceeds `max_texture_bytes`
    pub fn check_alloc(&self, needed: u64) -> ParseResult<usize> {
        match usize::try_from(needed) {
            Ok(n) if n <= self.max_texture_bytes => Ok(n),
            _ => Err(TextureError::TooLarge {
                needed,
                limit: self.max_texture_bytes as u64,
            }
            .into()),
        }
    }
}

/// Acceptance threshold: a handler wins only with a confidence above this
pub const ACCEPTANCE_THRESHOLD: u8 = 50;

/// Recognition score in `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Confidence(u8);

impl Confidence {
    pub const NONE: Confidence = Confidence(0);
    pub const CERTAIN: Confidence = Confidence(100);

    /// Create a confidence, clamping to 100
    pub const fn new(value: u8) -> Self {
        if value > 100 {
            Confidence(100)
        } else {
            Confidence(value)
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether this score is strictly above [`ACCEPTANCE_THRESHOLD`]
    pub const fn is_accepted(self) -> bool {
        self.0 > ACCEPTANCE_THRESHOLD
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// What a handler sees when asked to recognize a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    /// Leading bytes of the source (at most `probe_size`)
    pub prefix: Vec<u8>,
    /// Declared length of the whole source
    pub total_len: u64,
    /// Lowercase file extension without the dot
    pub extension: Option<String>,
}

impl ProbeInfo {
    pub fn new(prefix: impl Into<Vec<u8>>, total_len: u64) -> Self {
        Self {
            prefix: prefix.into(),
            total_len,
            extension: None,
        }
    }

    /// Read the probe prefix from a source
    pub fn read(source: &dyn ByteSource, probe_size: usize) -> ParseResult<Self> {
        Ok(Self::new(source.read_prefix(probe_size)?, source.len()))
    }

    pub fn with_extension(mut self, extension: Option<&str>) -> Self {
        self.extension = extension.map(|e| e.trim_start_matches('.').to_lowercase());
        self
    }

    /// Take the extension from a path
    pub fn with_path(self, path: &Path) -> Self {
        let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
        self.with_extension(ext.as_deref())
    }

    pub fn starts_with(&self, magic: &[u8]) -> bool {
        self.prefix.starts_with(magic)
    }

    /// Whether the extension is one of `extensions`
    pub fn has_extension(&self, extensions: &[&str]) -> bool {
        self.extension
            .as_deref()
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Output of a successful parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Id of the handler that produced this file
    pub format: &'static str,
    pub properties: PropertyModel,
    pub textures: Vec<DecodedTexture>,
}

impl ParsedFile {
    pub fn new(format: &'static str) -> Self {
        Self {
            format,
            properties: PropertyModel::new(),
            textures: Vec::new(),
        }
    }

    /// Store a texture and return a reference to it for the property model
    pub fn add_texture(&mut self, texture: DecodedTexture) -> BitmapRef {
        self.textures.push(texture);
        BitmapRef(self.textures.len() - 1)
    }

    /// Resolve a bitmap reference
    pub fn texture(&self, bitmap: BitmapRef) -> Option<&DecodedTexture> {
        self.textures.get(bitmap.0)
    }

    /// JSON view: format id, ordered properties and texture sizes
    pub fn to_json(&self) -> serde_json::Value {
        let textures: Vec<_> = self
            .textures
            .iter()
            .map(|t| {
                serde_json::json!({
                    "width": t.width(),
                    "height": t.height(),
                    "display_width": t.display_width,
                    "display_height": t.display_height,
                })
            })
            .collect();

        serde_json::json!({
            "format": self.format,
            "properties": self.properties.to_json(),
            "textures": textures,
        })
    }
}

/// Core trait for all container format handlers
///
/// Handlers are stateless; one instance serves concurrent parses of
/// independent sources.
pub trait FormatHandler: Send + Sync {
    /// Unique, stable identifier (e.g. `"snes"`)
    fn id(&self) -> &'static str;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Longer description for listings
    fn description(&self) -> &'static str {
        ""
    }

    /// File extensions this handler usually sees (lowercase, no dot)
    fn extensions(&self) -> &'static [&'static str];

    /// Score how likely the probed source is in this format
    fn recognize(&self, probe: &ProbeInfo) -> Confidence;

    /// Parse the whole source
    fn parse(&self, source: &dyn ByteSource, options: &ParseOptions) -> ParseResult<ParsedFile>;
}
