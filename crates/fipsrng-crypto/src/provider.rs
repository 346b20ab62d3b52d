//! Trait-based provider seam for the primitives the DRBG mechanisms consume.
//!
//! The mechanisms never touch a concrete hash or cipher; they are handed a
//! [`Primitive`] resolved once when the algorithm descriptor is built, and
//! create contexts through it.

use fipsrng_types::{CipherAlgId, CryptoError, HashAlgId};

/// A hash / message digest algorithm.
pub trait Digest: Send + Sync {
    /// The output size in bytes.
    fn output_size(&self) -> usize;

    /// Feed data into the hash state.
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Finalize the hash and write the digest to `out`.
    /// The length of `out` must be at least `output_size()`.
    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError>;

    /// Reset the hash state to process a new message.
    fn reset(&mut self);
}

/// A block cipher keyed for encryption.
pub trait BlockCipher: Send + Sync {
    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// Key size in bytes.
    fn key_size(&self) -> usize;

    /// Encrypt a single block in-place.
    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError>;
}

/// A keyed message authentication code.
pub trait Mac: Send {
    fn output_size(&self) -> usize;

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Finalize into `out` and re-arm with the same key.
    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError>;
}

/// The primitive a DRBG mechanism is built on: either a digest or a cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Digest(HashAlgId),
    Cipher(CipherAlgId),
}

impl Primitive {
    /// Create a digest context; fails for cipher-backed primitives.
    pub fn new_digest(&self) -> Result<Box<dyn Digest>, CryptoError> {
        match *self {
            Primitive::Digest(id) => Ok(crate::hash::new_digest(id)),
            Primitive::Cipher(_) => Err(CryptoError::NotSupported),
        }
    }

    /// Key an HMAC context over this primitive's digest.
    pub fn new_mac(&self, key: &[u8]) -> Result<Box<dyn Mac>, CryptoError> {
        match *self {
            Primitive::Digest(id) => crate::hash::new_hmac(id, key),
            Primitive::Cipher(_) => Err(CryptoError::NotSupported),
        }
    }

    /// Key a block cipher; fails for digest-backed primitives.
    pub fn new_cipher(&self, key: &[u8]) -> Result<Box<dyn BlockCipher>, CryptoError> {
        match *self {
            Primitive::Cipher(id) => {
                if key.len() != id.key_len() {
                    return Err(CryptoError::InvalidKeyLength(key.len()));
                }
                Ok(Box::new(crate::block::AesKey::new(key)?))
            }
            Primitive::Digest(_) => Err(CryptoError::NotSupported),
        }
    }

    /// Digest output size, or cipher block size.
    pub fn output_len(&self) -> usize {
        match *self {
            Primitive::Digest(id) => id.output_size(),
            Primitive::Cipher(id) => id.block_len(),
        }
    }
}
