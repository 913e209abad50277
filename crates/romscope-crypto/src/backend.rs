//! Block cipher backends
//!
//! A backend owns the expanded key schedule and transforms single 16-byte
//! blocks. Platform-accelerated implementations can be plugged in by
//! implementing [`BlockCipherBackend`]; chaining is never a backend concern.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};

use crate::error::{CipherError, CipherResult};

/// Cipher block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// One cipher block
pub type Block = [u8; BLOCK_SIZE];

/// Key schedule and single-block primitive
pub trait BlockCipherBackend: Send {
    /// Backend name for diagnostics
    fn name(&self) -> &'static str;

    /// Whether the backend can be used on this system
    fn is_available(&self) -> bool {
        true
    }

    /// Expand `key` into the internal key schedule
    fn expand_key(&mut self, key: &[u8]) -> CipherResult<()>;

    /// Encrypt one block in place
    fn encrypt_block(&self, block: &mut Block) -> CipherResult<()>;

    /// Decrypt one block in place
    fn decrypt_block(&self, block: &mut Block) -> CipherResult<()>;
}

enum KeySchedule {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

/// Portable AES implementation backed by the `aes` crate
#[derive(Default)]
pub struct SoftwareAes {
    schedule: Option<KeySchedule>,
}

impl SoftwareAes {
    /// Create a backend with no key loaded
    pub fn new() -> Self {
        Self::default()
    }

    fn schedule(&self) -> CipherResult<&KeySchedule> {
        self.schedule.as_ref().ok_or(CipherError::NotReady("key not set"))
    }
}

impl BlockCipherBackend for SoftwareAes {
    fn name(&self) -> &'static str {
        "software-aes"
    }

    fn expand_key(&mut self, key: &[u8]) -> CipherResult<()> {
        let invalid = |_| CipherError::InvalidKeySize(key.len());
        let schedule = match key.len() {
            16 => KeySchedule::Aes128(Aes128::new_from_slice(key).map_err(invalid)?),
            24 => KeySchedule::Aes192(Aes192::new_from_slice(key).map_err(invalid)?),
            32 => KeySchedule::Aes256(Aes256::new_from_slice(key).map_err(invalid)?),
            other => return Err(CipherError::InvalidKeySize(other)),
        };
        self.schedule = Some(schedule);
        Ok(())
    }

    fn encrypt_block(&self, block: &mut Block) -> CipherResult<()> {
        let block = aes::Block::from_mut_slice(block);
        match self.schedule()? {
            KeySchedule::Aes128(c) => c.encrypt_block(block),
            KeySchedule::Aes192(c) => c.encrypt_block(block),
            KeySchedule::Aes256(c) => c.encrypt_block(block),
        }
        Ok(())
    }

    fn decrypt_block(&self, block: &mut Block) -> CipherResult<()> {
        let block = aes::Block::from_mut_slice(block);
        match self.schedule()? {
            KeySchedule::Aes128(c) => c.decrypt_block(block),
            KeySchedule::Aes192(c) => c.decrypt_block(block),
            KeySchedule::Aes256(c) => c.decrypt_block(block),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(hex_str: &str) -> Block {
        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(&hex::decode(hex_str).unwrap());
        out
    }

    // FIPS-197 appendix C example vectors
    #[test]
    fn test_fips197_vectors() {
        let plaintext = block("00112233445566778899aabbccddeeff");
        let cases = [
            ("000102030405060708090a0b0c0d0e0f", "69c4e0d86a7b0430d8cdb78070b4c55a"),
            (
                "000102030405060708090a0b0c0d0e0f1011121314151617",
                "dda97ca4864cdfe06eaf70a0ec0d7191",
            ),
            (
                "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
                "8ea2b7ca516745bfeafc49904b496089",
            ),
        ];

        for (key, expected) in cases {
            let mut backend = SoftwareAes::new();
            backend.expand_key(&hex::decode(key).unwrap()).unwrap();

            let mut data = plaintext;
            backend.encrypt_block(&mut data).unwrap();
            assert_eq!(data, block(expected));

            backend.decrypt_block(&mut data).unwrap();
            assert_eq!(data, plaintext);
        }
    }

    #[test]
    fn test_rejects_bad_key_sizes() {
        let mut backend = SoftwareAes::new();
        for len in [0usize, 8, 15, 17, 31, 33, 64] {
            assert_eq!(backend.expand_key(&vec![0u8; len]), Err(CipherError::InvalidKeySize(len)));
        }
    }

    #[test]
    fn test_requires_key() {
        let backend = SoftwareAes::new();
        let mut data = [0u8; BLOCK_SIZE];
        assert!(matches!(backend.encrypt_block(&mut data), Err(CipherError::NotReady(_))));
    }
}
