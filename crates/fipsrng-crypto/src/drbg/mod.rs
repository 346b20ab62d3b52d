//! Deterministic Random Bit Generators (NIST SP 800-90A).
//!
//! Provides three DRBG mechanisms behind the [`Mechanism`] trait:
//! - Hash_DRBG (Section 10.1.1) over SHA-224/256/384/512
//! - HMAC_DRBG (Section 10.1.2) over HMAC-SHA-224/256/384/512
//! - CTR_DRBG (Section 10.2) over AES-128/192/256, with Block_Cipher_df
//!
//! Mechanisms only implement the four primitive operations. Lifecycle
//! state, limits, reseed accounting and the continuous test live in
//! [`DrbgEngine`].

pub mod ctr_drbg;
pub use ctr_drbg::CtrDrbg;

pub mod hash_drbg;
pub use hash_drbg::HashDrbg;

mod hmac_drbg;
pub use hmac_drbg::HmacDrbg;

pub mod engine;
pub use engine::{DrbgEngine, Instantiate};

pub mod pool;
pub use pool::RngPool;

use crate::provider::Primitive;
use fipsrng_types::CryptoError;

/// The primitive operations of one DRBG construction.
///
/// Inputs are passed as borrowed slices for the duration of one call only;
/// the engine has already checked every length against the descriptor.
pub trait Mechanism: Send {
    /// Seed length in bytes.
    fn seed_len(&self) -> usize;

    fn instantiate(
        &mut self,
        entropy: &[u8],
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<(), CryptoError>;

    fn reseed(&mut self, entropy: &[u8], additional: &[u8]) -> Result<(), CryptoError>;

    fn generate(&mut self, out: &mut [u8], additional: &[u8]) -> Result<(), CryptoError>;

    /// Zero all working state and release primitive contexts.
    fn cleanup(&mut self);

    /// True when no working state survives.
    fn is_zeroized(&self) -> bool;
}

/// Which construction a descriptor instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismKind {
    Hash,
    Hmac,
    Ctr,
}

impl MechanismKind {
    /// Build an empty mechanism of this kind over `primitive`.
    pub fn build(self, primitive: Primitive) -> Result<Box<dyn Mechanism>, CryptoError> {
        match (self, primitive) {
            (MechanismKind::Hash, Primitive::Digest(id)) => Ok(Box::new(HashDrbg::new(id))),
            (MechanismKind::Hmac, Primitive::Digest(id)) => Ok(Box::new(HmacDrbg::new(id))),
            (MechanismKind::Ctr, Primitive::Cipher(id)) => Ok(Box::new(CtrDrbg::new(id))),
            _ => Err(CryptoError::InvalidAlgId),
        }
    }
}
