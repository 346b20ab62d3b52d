//! AES single-block encryption backed by the `aes` crate.

use crate::provider::BlockCipher;
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};
use fipsrng_types::CryptoError;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// An AES key schedule for 128, 192 or 256-bit keys.
#[derive(Clone)]
pub enum AesKey {
    Aes128(aes::Aes128),
    Aes192(aes::Aes192),
    Aes256(aes::Aes256),
}

impl AesKey {
    /// Expand `key` (16, 24 or 32 bytes).
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let bad_len = |_| CryptoError::InvalidKeyLength(key.len());
        match key.len() {
            16 => Ok(AesKey::Aes128(
                aes::Aes128::new_from_slice(key).map_err(bad_len)?,
            )),
            24 => Ok(AesKey::Aes192(
                aes::Aes192::new_from_slice(key).map_err(bad_len)?,
            )),
            32 => Ok(AesKey::Aes256(
                aes::Aes256::new_from_slice(key).map_err(bad_len)?,
            )),
            n => Err(CryptoError::InvalidKeyLength(n)),
        }
    }
}

impl BlockCipher for AesKey {
    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn key_size(&self) -> usize {
        match self {
            AesKey::Aes128(_) => 16,
            AesKey::Aes192(_) => 24,
            AesKey::Aes256(_) => 32,
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != AES_BLOCK_SIZE {
            return Err(CryptoError::InvalidArg);
        }
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesKey::Aes128(c) => c.encrypt_block(block),
            AesKey::Aes192(c) => c.encrypt_block(block),
            AesKey::Aes256(c) => c.encrypt_block(block),
        }
        Ok(())
    }
}
