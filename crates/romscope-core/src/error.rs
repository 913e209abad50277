//! Unified error handling for the byte and struct layers
//!
//! Every input handled here is assumed to be hostile or corrupted, so all
//! of these are ordinary, recoverable values returned to the caller.

use thiserror::Error;

/// Error type for byte source and struct reader operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error from a backing store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Read extends past the declared length of the source
    #[error("Read out of range: offset {offset} + length {length} exceeds source length {size}")]
    OutOfRange {
        offset: u64,
        length: u64,
        size: u64,
    },

    /// The backing storage ended before the declared length (e.g. truncated download)
    #[error("Source truncated: storage ended at offset {offset}, declared length {declared}")]
    Truncated {
        offset: u64,
        declared: u64,
    },

    /// Block-mode view read at an offset or length that is not block aligned
    #[error("Unaligned access: offset {offset}, length {length} (block size {block_size})")]
    UnalignedAccess {
        offset: u64,
        length: u64,
        block_size: usize,
    },

    /// A decrypting view failed to decrypt its ciphertext
    #[error("Cipher error: {message}")]
    Cipher {
        message: String,
    },

    // ==================== Struct Errors ====================

    /// A struct's byte range extends past the end of the source
    #[error("Bounds error decoding {name}: needs {needed} bytes at offset {offset}, {available} available")]
    Bounds {
        name: &'static str,
        offset: u64,
        needed: usize,
        available: u64,
    },

    /// Field is not part of the struct descriptor
    #[error("Field '{field}' not found in {name}")]
    FieldNotFound {
        name: &'static str,
        field: String,
    },

    /// Field exists but holds a different kind of value
    #[error("Field '{field}' has type {actual}, requested {requested}")]
    FieldType {
        field: &'static str,
        actual: &'static str,
        requested: &'static str,
    },

    // ==================== General Errors ====================

    /// Invalid data structure
    #[error("Invalid data: {message}")]
    InvalidData {
        message: String,
    },

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    /// Check if this error means the input was shorter than required
    pub fn is_bounds_error(&self) -> bool {
        match self {
            Error::OutOfRange { .. } | Error::Truncated { .. } | Error::Bounds { .. } => true,
            Error::WithContext { source, .. } => source.is_bounds_error(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::OutOfRange { offset: 10, length: 4, size: 12 };
        let contextualized = err.with_context("while reading header");

        assert!(contextualized.to_string().contains("while reading header"));
    }

    #[test]
    fn test_is_bounds_error() {
        assert!(Error::Truncated { offset: 4, declared: 8 }.is_bounds_error());
        assert!(Error::Bounds { name: "hdr", offset: 0, needed: 8, available: 4 }
            .with_context("nested")
            .is_bounds_error());
        assert!(!Error::invalid_data("bad").is_bounds_error());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::invalid_data("bad magic"));
        let with_context = result.context("loading data");

        assert!(with_context.is_err());
        assert!(with_context.unwrap_err().to_string().contains("loading data"));
    }
}
