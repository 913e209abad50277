//! romscope-formats
//!
//! Format recognition and dispatch for romscope, plus the built-in handlers.
//!
//! # Supported Formats
//!
//! | Format   | Extension                  | Description                  |
//! |----------|----------------------------|------------------------------|
//! | DDS      | `.dds`                     | DirectDraw Surface texture   |
//! | Didj     | `.tex`                     | Leapster Didj texture        |
//! | SNES     | `.sfc` `.smc` `.swc` `.fig`| Super Nintendo ROM image     |
//!
//! # Example
//!
//! ```rust,no_run
//! use romscope_formats::{ParseOptions, BUILTIN_REGISTRY};
//!
//! let parsed = BUILTIN_REGISTRY.parse_path("game.sfc", &ParseOptions::default())?;
//! for (name, value) in parsed.properties.iter() {
//!     println!("{}: {}", name, value);
//! }
//! # Ok::<(), romscope_formats::RegistryError>(())
//! ```

pub mod handlers;
pub mod logging;
pub mod registry;
pub mod traits;

// Re-export main types
pub use traits::{
    Confidence, FormatHandler, ParseError, ParseOptions, ParseResult, ParsedFile, ProbeInfo,
    ACCEPTANCE_THRESHOLD,
};

pub use registry::{FormatRegistry, HandlerInfo, Identified, RegistryError, BUILTIN_REGISTRY};

pub use handlers::{DdsHandler, DidjTexHandler, SnesHandler};
