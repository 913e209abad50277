//! Cipher context: key, chaining mode and IV/counter state

use tracing::debug;

use crate::backend::{Block, BlockCipherBackend, SoftwareAes, BLOCK_SIZE};
use crate::error::{CipherError, CipherResult};

/// Block cipher mode of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainingMode {
    Ecb,
    Cbc,
    Ctr,
}

impl ChainingMode {
    /// Whether this mode requires an IV or initial counter
    pub fn needs_iv(self) -> bool {
        !matches!(self, ChainingMode::Ecb)
    }

    /// Whether this mode accepts arbitrary lengths and offsets
    pub fn is_stream(self) -> bool {
        matches!(self, ChainingMode::Ctr)
    }
}

impl std::str::FromStr for ChainingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ecb" => Ok(ChainingMode::Ecb),
            "cbc" => Ok(ChainingMode::Cbc),
            "ctr" => Ok(ChainingMode::Ctr),
            _ => Err(format!("Unknown chaining mode: {}", s)),
        }
    }
}

/// Add `blocks` to a 128-bit big-endian counter, wrapping on overflow
pub fn counter_add(counter: &Block, blocks: u64) -> Block {
    u128::from_be_bytes(*counter)
        .wrapping_add(u128::from(blocks))
        .to_be_bytes()
}

/// Keyed cipher state.
///
/// `decrypt`/`encrypt` and `set_iv` mutate the chaining state, so a context
/// must not be shared between threads without a lock. A context with a key
/// but no chaining mode behaves as ECB.
pub struct CipherContext<B: BlockCipherBackend = SoftwareAes> {
    backend: B,
    keyed: bool,
    mode: Option<ChainingMode>,
    /// CBC feedback register or CTR counter
    register: Option<Block>,
    /// Keystream of the current CTR block
    keystream: Block,
    /// Bytes of `keystream` already consumed
    keystream_pos: usize,
}

impl CipherContext<SoftwareAes> {
    /// Create a context using the portable AES backend
    pub fn new() -> Self {
        Self::with_backend(SoftwareAes::new())
    }
}

impl Default for CipherContext<SoftwareAes> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BlockCipherBackend> CipherContext<B> {
    /// Create a context around a specific backend
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            keyed: false,
            mode: None,
            register: None,
            keystream: [0u8; BLOCK_SIZE],
            keystream_pos: BLOCK_SIZE,
        }
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Whether a key has been loaded
    pub fn is_keyed(&self) -> bool {
        self.keyed
    }

    /// Active chaining mode (ECB if none was set)
    pub fn chaining_mode(&self) -> ChainingMode {
        self.mode.unwrap_or(ChainingMode::Ecb)
    }

    /// Current CBC feedback register or CTR counter
    pub fn register(&self) -> Option<&Block> {
        self.register.as_ref()
    }

    fn reset_register(&mut self) {
        self.register = None;
        self.keystream_pos = BLOCK_SIZE;
    }

    /// Load a 16, 24 or 32 byte key. Clears any IV/counter state.
    pub fn set_key(&mut self, key: &[u8]) -> CipherResult<()> {
        if !self.backend.is_available() {
            return Err(CipherError::BackendUnavailable(self.backend.name()));
        }
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(CipherError::InvalidKeySize(key.len()));
        }

        self.backend.expand_key(key)?;
        self.keyed = true;
        self.reset_register();
        Ok(())
    }

    /// Select the chaining mode. The IV/counter must be set afterwards.
    pub fn set_chaining_mode(&mut self, mode: ChainingMode) -> CipherResult<()> {
        if self.mode != Some(mode) {
            self.mode = Some(mode);
            self.reset_register();
        }
        Ok(())
    }

    /// Set the CBC IV or the CTR initial counter
    pub fn set_iv(&mut self, iv: &[u8]) -> CipherResult<()> {
        let mode = self.mode.ok_or(CipherError::NotReady("chaining mode not set"))?;
        if !self.keyed {
            return Err(CipherError::NotReady("key not set"));
        }
        if !mode.needs_iv() {
            return Err(CipherError::InvalidForMode {
                mode,
                operation: "set_iv",
            });
        }

        let register: Block = iv
            .try_into()
            .map_err(|_| CipherError::InvalidIvSize(iv.len()))?;
        self.register = Some(register);
        self.keystream_pos = BLOCK_SIZE;
        Ok(())
    }

    fn check_ready(&self, len: usize) -> CipherResult<ChainingMode> {
        if !self.keyed {
            return Err(CipherError::NotReady("key not set"));
        }

        let mode = self.chaining_mode();
        if mode.needs_iv() && self.register.is_none() {
            return Err(CipherError::NotReady("IV/counter not set"));
        }
        if !mode.is_stream() && len % BLOCK_SIZE != 0 {
            return Err(CipherError::UnalignedAccess {
                length: len,
                block_size: BLOCK_SIZE,
            });
        }
        Ok(mode)
    }

    /// Decrypt `data` in place, returning the number of bytes processed.
    ///
    /// CBC continues from the last ciphertext block of the previous call and
    /// CTR continues from the previous keystream position, so large payloads
    /// can be processed across multiple calls.
    pub fn try_decrypt(&mut self, data: &mut [u8]) -> CipherResult<usize> {
        match self.check_ready(data.len())? {
            ChainingMode::Ecb => {
                for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
                    self.backend.decrypt_block(as_block(chunk))?;
                }
            }
            ChainingMode::Cbc => {
                let mut feedback = self.register.unwrap_or_default();
                for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
                    let block = as_block(chunk);
                    let ciphertext = *block;
                    self.backend.decrypt_block(block)?;
                    xor_in_place(block, &feedback);
                    feedback = ciphertext;
                }
                self.register = Some(feedback);
            }
            ChainingMode::Ctr => self.apply_keystream(data)?,
        }
        Ok(data.len())
    }

    /// Encrypt `data` in place, returning the number of bytes processed
    pub fn try_encrypt(&mut self, data: &mut [u8]) -> CipherResult<usize> {
        match self.check_ready(data.len())? {
            ChainingMode::Ecb => {
                for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
                    self.backend.encrypt_block(as_block(chunk))?;
                }
            }
            ChainingMode::Cbc => {
                let mut feedback = self.register.unwrap_or_default();
                for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
                    let block = as_block(chunk);
                    xor_in_place(block, &feedback);
                    self.backend.encrypt_block(block)?;
                    feedback = *block;
                }
                self.register = Some(feedback);
            }
            ChainingMode::Ctr => self.apply_keystream(data)?,
        }
        Ok(data.len())
    }

    /// Decrypt in place; returns 0 on any failure
    pub fn decrypt(&mut self, data: &mut [u8]) -> usize {
        self.try_decrypt(data).unwrap_or_else(|e| {
            debug!(backend = self.backend.name(), error = %e, "decrypt failed");
            0
        })
    }

    /// Encrypt in place; returns 0 on any failure
    pub fn encrypt(&mut self, data: &mut [u8]) -> usize {
        self.try_encrypt(data).unwrap_or_else(|e| {
            debug!(backend = self.backend.name(), error = %e, "encrypt failed");
            0
        })
    }

    /// CTR: XOR with the block encryption of an incrementing counter
    fn apply_keystream(&mut self, data: &mut [u8]) -> CipherResult<()> {
        let mut counter = self.register.ok_or(CipherError::NotReady("IV/counter not set"))?;

        for byte in data.iter_mut() {
            if self.keystream_pos == BLOCK_SIZE {
                let mut keystream = counter;
                self.backend.encrypt_block(&mut keystream)?;
                self.keystream = keystream;
                self.keystream_pos = 0;
                counter = counter_add(&counter, 1);
            }
            *byte ^= self.keystream[self.keystream_pos];
            self.keystream_pos += 1;
        }

        self.register = Some(counter);
        Ok(())
    }
}

fn as_block(chunk: &mut [u8]) -> &mut Block {
    // chunks_exact_mut(BLOCK_SIZE) only yields full blocks
    <&mut Block>::try_from(chunk).unwrap_or_else(|_| unreachable!("chunk is exactly one block"))
}

fn xor_in_place(block: &mut Block, other: &Block) {
    for (b, o) in block.iter_mut().zip(other.iter()) {
        *b ^= o;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY_128: &str = "2b7e151628aed2a6abf7158809cf4f3c";

    // NIST SP 800-38A, appendix F plaintext (four blocks)
    const SP800_38A_PLAINTEXT: &str = concat!(
        "6bc1bee22e409f96e93d7e117393172a",
        "ae2d8a571e03ac9c9eb76fac45af8e51",
        "30c81c46a35ce411e5fbc1191a0a52ef",
        "f69f2445df4f9b17ad2b417be66c3710",
    );

    fn keyed(mode: ChainingMode, key: &str, iv: Option<&str>) -> CipherContext {
        let mut ctx = CipherContext::new();
        ctx.set_key(&hex::decode(key).unwrap()).unwrap();
        ctx.set_chaining_mode(mode).unwrap();
        if let Some(iv) = iv {
            ctx.set_iv(&hex::decode(iv).unwrap()).unwrap();
        }
        ctx
    }

    #[test]
    fn test_ecb_known_vector() {
        let mut ctx = keyed(ChainingMode::Ecb, KEY_128, None);
        let mut data = hex::decode(concat!(
            "3ad77bb40d7a3660a89ecaf32466ef97",
            "f5d3d58503b9699de785895a96fdbaaf",
            "43b1cd7f598ece23881b00e3ed030688",
            "7b0c785e27e8ad3f8223207104725dd4",
        ))
        .unwrap();

        assert_eq!(ctx.decrypt(&mut data), 64);
        assert_eq!(hex::encode(&data), SP800_38A_PLAINTEXT);
    }

    #[test]
    fn test_cbc_known_vector_streamed() {
        let mut ctx = keyed(ChainingMode::Cbc, KEY_128, Some("000102030405060708090a0b0c0d0e0f"));
        let mut data = hex::decode(concat!(
            "7649abac8119b246cee98e9b12e9197d",
            "5086cb9b507219ee95db113a917678b2",
            "73bed6b8e3c1743b7116e69e22229516",
            "3ff1caa1681fac09120eca307586e1a7",
        ))
        .unwrap();

        // Split across calls: the feedback register must carry over.
        let (first, rest) = data.split_at_mut(16);
        assert_eq!(ctx.decrypt(first), 16);
        assert_eq!(ctx.decrypt(rest), 48);
        assert_eq!(hex::encode(&data), SP800_38A_PLAINTEXT);
    }

    #[test]
    fn test_ctr_known_vector() {
        let mut ctx = keyed(ChainingMode::Ctr, KEY_128, Some("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff"));
        let mut data = hex::decode(concat!(
            "874d6191b620e3261bef6864990db6ce",
            "9806f66b7970fdff8617187bb9fffdff",
            "5ae4df3edbd5d35e5b4f09020db03eab",
            "1e031dda2fbe03d1792170a0f3009cee",
        ))
        .unwrap();

        assert_eq!(ctx.decrypt(&mut data), 64);
        assert_eq!(hex::encode(&data), SP800_38A_PLAINTEXT);
        assert_eq!(
            ctx.register().map(hex::encode),
            Some("f0f1f2f3f4f5f6f7f8f9fafbfcfe0003".to_string())
        );
    }

    #[test]
    fn test_ctr_odd_length_chunks_continue_keystream() {
        let iv = "f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff";
        let plaintext = hex::decode(SP800_38A_PLAINTEXT).unwrap();

        let mut whole = plaintext.clone();
        keyed(ChainingMode::Ctr, KEY_128, Some(iv)).encrypt(&mut whole);

        let mut pieces = plaintext.clone();
        let mut ctx = keyed(ChainingMode::Ctr, KEY_128, Some(iv));
        for chunk in pieces.chunks_mut(7) {
            assert_eq!(ctx.encrypt(chunk), chunk.len());
        }
        assert_eq!(pieces, whole);
    }

    #[test]
    fn test_ctr_matches_reference_implementation() {
        use aes::cipher::{KeyIvInit, StreamCipher};

        let key = [0x42u8; 32];
        let iv = [0xFFu8; 16]; // exercises the full 128-bit carry
        let mut expected = vec![0x5Au8; 100];
        let mut reference = ctr::Ctr128BE::<aes::Aes256>::new(&key.into(), &iv.into());
        reference.apply_keystream(&mut expected);

        let mut ours = vec![0x5Au8; 100];
        let mut ctx = CipherContext::new();
        ctx.set_key(&key).unwrap();
        ctx.set_chaining_mode(ChainingMode::Ctr).unwrap();
        ctx.set_iv(&iv).unwrap();
        assert_eq!(ctx.encrypt(&mut ours), 100);
        assert_eq!(ours, expected);
    }

    #[test]
    fn test_set_key_validation() {
        let mut ctx = CipherContext::new();
        assert_eq!(ctx.set_key(&[0u8; 20]), Err(CipherError::InvalidKeySize(20)));
        assert!(!ctx.is_keyed());
        for len in [16, 24, 32] {
            assert_eq!(ctx.set_key(&vec![1u8; len]), Ok(()));
        }
    }

    #[test]
    fn test_set_iv_requires_mode_first() {
        let mut ctx = CipherContext::new();
        ctx.set_key(&[0u8; 16]).unwrap();
        assert!(matches!(ctx.set_iv(&[0u8; 16]), Err(CipherError::NotReady(_))));

        ctx.set_chaining_mode(ChainingMode::Ecb).unwrap();
        assert_eq!(
            ctx.set_iv(&[0u8; 16]),
            Err(CipherError::InvalidForMode { mode: ChainingMode::Ecb, operation: "set_iv" })
        );

        ctx.set_chaining_mode(ChainingMode::Cbc).unwrap();
        assert_eq!(ctx.set_iv(&[0u8; 8]), Err(CipherError::InvalidIvSize(8)));
        assert_eq!(ctx.set_iv(&[0u8; 16]), Ok(()));
    }

    #[test]
    fn test_decrypt_failures_return_zero() {
        // No key
        let mut ctx = CipherContext::new();
        let mut data = [0u8; 32];
        assert_eq!(ctx.decrypt(&mut data), 0);

        // Unaligned ECB
        ctx.set_key(&[0u8; 16]).unwrap();
        let mut odd = [0u8; 17];
        assert_eq!(ctx.decrypt(&mut odd), 0);
        assert_eq!(odd, [0u8; 17]);

        // CBC without an IV
        ctx.set_chaining_mode(ChainingMode::Cbc).unwrap();
        assert_eq!(ctx.decrypt(&mut data), 0);
        assert!(matches!(ctx.try_decrypt(&mut data), Err(CipherError::NotReady(_))));
    }

    #[test]
    fn test_counter_add_carries() {
        let counter = [0xFFu8; 16];
        assert_eq!(counter_add(&counter, 1), [0u8; 16]);

        let mut low = [0u8; 16];
        low[15] = 0xFE;
        let bumped = counter_add(&low, 3);
        assert_eq!(bumped[14], 1);
        assert_eq!(bumped[15], 1);
    }

    fn mode_strategy() -> impl Strategy<Value = ChainingMode> {
        prop_oneof![
            Just(ChainingMode::Ecb),
            Just(ChainingMode::Cbc),
            Just(ChainingMode::Ctr),
        ]
    }

    proptest! {
        #[test]
        fn prop_encrypt_decrypt_roundtrip(
            key_len in prop_oneof![Just(16usize), Just(24usize), Just(32usize)],
            key_byte in any::<u8>(),
            iv in any::<[u8; 16]>(),
            mode in mode_strategy(),
            blocks in 0usize..8,
            tail in 0usize..16,
            fill in any::<u8>(),
        ) {
            let len = if mode.is_stream() { blocks * 16 + tail } else { blocks * 16 };
            let plaintext: Vec<u8> = (0..len).map(|i| fill.wrapping_add(i as u8)).collect();
            let key = vec![key_byte; key_len];

            let setup = |ctx: &mut CipherContext| {
                ctx.set_key(&key).unwrap();
                ctx.set_chaining_mode(mode).unwrap();
                if mode.needs_iv() {
                    ctx.set_iv(&iv).unwrap();
                }
            };

            let mut data = plaintext.clone();
            let mut enc = CipherContext::new();
            setup(&mut enc);
            prop_assert_eq!(enc.encrypt(&mut data), len);

            let mut dec = CipherContext::new();
            setup(&mut dec);
            prop_assert_eq!(dec.decrypt(&mut data), len);
            prop_assert_eq!(data, plaintext);
        }
    }
}
