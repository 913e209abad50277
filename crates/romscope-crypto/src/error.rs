//! Cipher misuse and failure errors

use thiserror::Error;

use crate::context::ChainingMode;

/// Errors returned by the cipher core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Invalid key size: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeySize(usize),

    #[error("Invalid IV size: {0} bytes (expected 16)")]
    InvalidIvSize(usize),

    #[error("{operation} is not valid in {mode:?} mode")]
    InvalidForMode {
        mode: ChainingMode,
        operation: &'static str,
    },

    #[error("Cipher not ready: {0}")]
    NotReady(&'static str),

    #[error("Unaligned access: {length} bytes is not a multiple of the {block_size}-byte block size")]
    UnalignedAccess { length: usize, block_size: usize },

    #[error("Cipher backend '{0}' is not available")]
    BackendUnavailable(&'static str),
}

/// Result type alias for cipher operations
pub type CipherResult<T> = Result<T, CipherError>;

impl From<CipherError> for romscope_core::Error {
    fn from(err: CipherError) -> Self {
        romscope_core::Error::Cipher {
            message: err.to_string(),
        }
    }
}
