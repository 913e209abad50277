//! Decrypted view over an encrypted byte source

use parking_lot::Mutex;
use tracing::trace;

use romscope_core::source::check_range;
use romscope_core::{ByteSource, Error, Result};

use crate::backend::{Block, BlockCipherBackend, SoftwareAes, BLOCK_SIZE};
use crate::context::{counter_add, ChainingMode, CipherContext};
use crate::error::{CipherError, CipherResult};

/// [`ByteSource`] that decrypts the ciphertext of `base` on every read.
///
/// The base IV (or initial counter) refers to offset 0 of `base`. CTR views
/// accept any offset and length by fast-forwarding the counter; ECB and CBC
/// views only accept block-aligned reads. Nothing is cached.
pub struct DecryptingSource<S, B: BlockCipherBackend = SoftwareAes> {
    base: S,
    cipher: Mutex<CipherContext<B>>,
    iv: Block,
    mode: ChainingMode,
}

impl<S: ByteSource, B: BlockCipherBackend> DecryptingSource<S, B> {
    /// Wrap `base` with a keyed cipher.
    ///
    /// `iv` is required for CBC and CTR and must be `None` for ECB.
    pub fn new(base: S, cipher: CipherContext<B>, iv: Option<&[u8]>) -> CipherResult<Self> {
        if !cipher.is_keyed() {
            return Err(CipherError::NotReady("key not set"));
        }

        let mode = cipher.chaining_mode();
        let iv: Block = match (mode.needs_iv(), iv) {
            (true, Some(iv)) => iv
                .try_into()
                .map_err(|_| CipherError::InvalidIvSize(iv.len()))?,
            (true, None) => return Err(CipherError::NotReady("IV/counter not set")),
            (false, Some(_)) => {
                return Err(CipherError::InvalidForMode {
                    mode,
                    operation: "set_iv",
                })
            }
            (false, None) => [0u8; BLOCK_SIZE],
        };

        Ok(Self {
            base,
            cipher: Mutex::new(cipher),
            iv,
            mode,
        })
    }

    /// Chaining mode of the view
    pub fn mode(&self) -> ChainingMode {
        self.mode
    }

    /// The wrapped ciphertext source
    pub fn base(&self) -> &S {
        &self.base
    }

    /// Unwrap into the ciphertext source
    pub fn into_inner(self) -> S {
        self.base
    }

    fn check_aligned(&self, offset: u64, length: usize) -> Result<()> {
        let block = BLOCK_SIZE as u64;
        if offset % block != 0 || length as u64 % block != 0 {
            return Err(Error::UnalignedAccess {
                offset,
                length: length as u64,
                block_size: BLOCK_SIZE,
            });
        }
        Ok(())
    }
}

impl<S: ByteSource, B: BlockCipherBackend> ByteSource for DecryptingSource<S, B> {
    fn len(&self) -> u64 {
        self.base.len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len() as u64, self.len())?;
        if buf.is_empty() {
            return Ok(());
        }

        trace!(offset, length = buf.len(), mode = ?self.mode, "decrypting read");

        match self.mode {
            ChainingMode::Ecb => {
                self.check_aligned(offset, buf.len())?;
                self.base.read_at(offset, buf)?;
                self.cipher.lock().try_decrypt(buf)?;
            }
            ChainingMode::Cbc => {
                self.check_aligned(offset, buf.len())?;
                // Chaining value for the first block is the preceding ciphertext block
                let mut chain = self.iv;
                if offset > 0 {
                    self.base.read_at(offset - BLOCK_SIZE as u64, &mut chain)?;
                }
                self.base.read_at(offset, buf)?;

                let mut cipher = self.cipher.lock();
                cipher.set_iv(&chain)?;
                cipher.try_decrypt(buf)?;
            }
            ChainingMode::Ctr => {
                self.base.read_at(offset, buf)?;

                let block = BLOCK_SIZE as u64;
                let counter = counter_add(&self.iv, offset / block);
                let skip = (offset % block) as usize;

                let mut cipher = self.cipher.lock();
                cipher.set_iv(&counter)?;
                if skip > 0 {
                    let mut discard = [0u8; BLOCK_SIZE];
                    cipher.try_decrypt(&mut discard[..skip])?;
                }
                cipher.try_decrypt(buf)?;
            }
        }
        Ok(())
    }
}
