//! romscope-crypto
//!
//! Generic symmetric block cipher core used to read partially or fully
//! encrypted containers.
//!
//! The block primitive (key schedule, single-block encrypt/decrypt) is supplied
//! by a [`BlockCipherBackend`]; [`SoftwareAes`] is the portable implementation.
//! Chaining modes (ECB, CBC, and CTR built from block encryption of a 128-bit
//! big-endian counter) live in [`CipherContext`] and behave identically for
//! every backend.
//!
//! # Example
//!
//! ```rust
//! use romscope_crypto::{CipherContext, ChainingMode};
//!
//! let mut ctx = CipherContext::new();
//! ctx.set_key(&[0u8; 16]).unwrap();
//! ctx.set_chaining_mode(ChainingMode::Ctr).unwrap();
//! ctx.set_iv(&[0u8; 16]).unwrap();
//!
//! let mut data = *b"any length works in CTR";
//! assert_eq!(ctx.decrypt(&mut data), data.len());
//! ```

pub mod backend;
pub mod context;
pub mod error;
pub mod source;

pub use backend::{Block, BlockCipherBackend, SoftwareAes, BLOCK_SIZE};
pub use context::{counter_add, ChainingMode, CipherContext};
pub use error::{CipherError, CipherResult};
pub use source::DecryptingSource;
