//! HMAC_DRBG (Deterministic Random Bit Generator) implementation.
//!
//! NIST SP 800-90A Section 10.1.2 over HMAC-SHA-224/256/384/512.

use super::Mechanism;
use crate::hash;
use fipsrng_types::{CryptoError, HashAlgId};
use zeroize::Zeroize;

/// Largest HMAC output (SHA-512).
const MAX_OUT_LEN: usize = 64;

/// HMAC_DRBG working state.
pub struct HmacDrbg {
    alg: HashAlgId,
    /// HMAC key K; only the first `outlen` bytes are used.
    k: [u8; MAX_OUT_LEN],
    /// Value V.
    v: [u8; MAX_OUT_LEN],
}

impl HmacDrbg {
    pub fn new(alg: HashAlgId) -> Self {
        HmacDrbg {
            alg,
            k: [0u8; MAX_OUT_LEN],
            v: [0u8; MAX_OUT_LEN],
        }
    }

    /// K = HMAC(K, V ‖ round ‖ provided…)
    fn rekey(&mut self, round: u8, provided: &[&[u8]]) -> Result<(), CryptoError> {
        let ol = self.alg.output_size();
        let mut mac = hash::new_hmac(self.alg, &self.k[..ol])?;
        mac.update(&self.v[..ol])?;
        mac.update(&[round])?;
        for p in provided {
            mac.update(p)?;
        }
        mac.finish(&mut self.k)
    }

    /// V = HMAC(K, V)
    fn step(&mut self) -> Result<(), CryptoError> {
        let ol = self.alg.output_size();
        let mut mac = hash::new_hmac(self.alg, &self.k[..ol])?;
        mac.update(&self.v[..ol])?;
        mac.finish(&mut self.v)
    }

    /// HMAC_DRBG_Update (SP 800-90A §10.1.2.2). The provided data is the
    /// concatenation of `provided`.
    fn update(&mut self, provided: &[&[u8]]) -> Result<(), CryptoError> {
        self.rekey(0x00, provided)?;
        self.step()?;
        if provided.iter().all(|p| p.is_empty()) {
            return Ok(());
        }
        self.rekey(0x01, provided)?;
        self.step()
    }
}

impl Mechanism for HmacDrbg {
    fn seed_len(&self) -> usize {
        self.alg.output_size()
    }

    /// HMAC_DRBG_Instantiate (SP 800-90A §10.1.2.3).
    fn instantiate(
        &mut self,
        entropy: &[u8],
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<(), CryptoError> {
        let ol = self.alg.output_size();
        self.k.zeroize();
        self.v.zeroize();
        self.v[..ol].fill(0x01);
        self.update(&[entropy, nonce, personalization])
    }

    /// HMAC_DRBG_Reseed (SP 800-90A §10.1.2.4).
    fn reseed(&mut self, entropy: &[u8], additional: &[u8]) -> Result<(), CryptoError> {
        self.update(&[entropy, additional])
    }

    /// HMAC_DRBG_Generate (SP 800-90A §10.1.2.5).
    fn generate(&mut self, out: &mut [u8], additional: &[u8]) -> Result<(), CryptoError> {
        let ol = self.alg.output_size();
        if !additional.is_empty() {
            self.update(&[additional])?;
        }

        for chunk in out.chunks_mut(ol) {
            self.step()?;
            chunk.copy_from_slice(&self.v[..chunk.len()]);
        }

        self.update(&[additional])
    }

    fn cleanup(&mut self) {
        self.k.zeroize();
        self.v.zeroize();
    }

    fn is_zeroized(&self) -> bool {
        self.k.iter().chain(self.v.iter()).all(|&b| b == 0)
    }
}

impl Drop for HmacDrbg {
    fn drop(&mut self) {
        self.cleanup();
    }
}
