//! Hash_DRBG (Hash-based Deterministic Random Bit Generator).
//!
//! Implements NIST SP 800-90A Section 10.1.1 over SHA-224, SHA-256,
//! SHA-384 or SHA-512.

use super::Mechanism;
use crate::hash;
use fipsrng_types::{CryptoError, HashAlgId};
use zeroize::{Zeroize, Zeroizing};

/// Largest seed length (SHA-384/512).
pub const MAX_SEED_LEN: usize = 111;

/// Largest digest size (SHA-512).
const MAX_OUT_LEN: usize = 64;

/// Seed length in bytes (SP 800-90A Table 2).
pub fn seed_len(alg: HashAlgId) -> usize {
    match alg {
        HashAlgId::Sha224 | HashAlgId::Sha256 => 55,
        HashAlgId::Sha384 | HashAlgId::Sha512 => 111,
    }
}

/// Hash over the concatenation of `parts` into `out` (digest-size bytes).
fn hash_into(alg: HashAlgId, parts: &[&[u8]], out: &mut [u8; MAX_OUT_LEN]) -> Result<(), CryptoError> {
    let mut h = hash::new_digest(alg);
    for p in parts {
        h.update(p)?;
    }
    h.finish(out)
}

/// Hash_df: Hash derivation function (SP 800-90A §10.3.1).
///
/// Fills `out` from Hash(counter ‖ be32(no_of_bits) ‖ input) blocks. The
/// one-byte counter caps `out` at 255 digests.
pub fn hash_df(alg: HashAlgId, parts: &[&[u8]], out: &mut [u8]) -> Result<(), CryptoError> {
    let hl = alg.output_size();
    if out.len() > 255 * hl {
        return Err(CryptoError::InputOverflow);
    }
    let bits = u32::try_from(out.len() * 8).map_err(|_| CryptoError::InputOverflow)?;
    let mut block = Zeroizing::new([0u8; MAX_OUT_LEN]);
    let mut counter: u8 = 1;
    for chunk in out.chunks_mut(hl) {
        let mut h = hash::new_digest(alg);
        h.update(&[counter])?;
        h.update(&bits.to_be_bytes())?;
        for p in parts {
            h.update(p)?;
        }
        h.finish(&mut block[..])?;
        chunk.copy_from_slice(&block[..chunk.len()]);
        counter = counter.saturating_add(1);
    }
    Ok(())
}

/// Big-endian modular addition: v = (v + addend) mod 2^(8*len).
/// `addend` is right-aligned against `v`.
fn v_add(v: &mut [u8], addend: &[u8]) {
    let len = v.len();
    let alen = addend.len();
    let mut carry: u16 = 0;
    for i in (0..len).rev() {
        let a = if i >= len - alen {
            addend[i - (len - alen)] as u16
        } else {
            0
        };
        let sum = v[i] as u16 + a + carry;
        v[i] = sum as u8;
        carry = sum >> 8;
    }
}

/// Big-endian modular addition of a u64.
fn v_add_u64(v: &mut [u8], val: u64) {
    v_add(v, &val.to_be_bytes());
}

/// Hash_DRBG working state.
pub struct HashDrbg {
    alg: HashAlgId,
    /// State value V; only the first `seed_len` bytes are used.
    v: [u8; MAX_SEED_LEN],
    /// Constant C.
    c: [u8; MAX_SEED_LEN],
    /// Generate requests since the last (re)seed, starting at 1.
    reseed_counter: u64,
}

impl HashDrbg {
    pub fn new(alg: HashAlgId) -> Self {
        HashDrbg {
            alg,
            v: [0u8; MAX_SEED_LEN],
            c: [0u8; MAX_SEED_LEN],
            reseed_counter: 0,
        }
    }

    /// C = Hash_df(0x00 ‖ V, seedlen); reset the reseed counter.
    fn derive_constant(&mut self) -> Result<(), CryptoError> {
        let sl = seed_len(self.alg);
        hash_df(self.alg, &[&[0x00u8], &self.v[..sl]], &mut self.c[..sl])?;
        self.reseed_counter = 1;
        Ok(())
    }

    /// Hashgen (SP 800-90A §10.1.1.4).
    fn hashgen(&self, out: &mut [u8]) -> Result<(), CryptoError> {
        let sl = seed_len(self.alg);
        let hl = self.alg.output_size();
        let mut data = Zeroizing::new(self.v);
        let mut block = Zeroizing::new([0u8; MAX_OUT_LEN]);
        for chunk in out.chunks_mut(hl) {
            hash_into(self.alg, &[&data[..sl]], &mut block)?;
            chunk.copy_from_slice(&block[..chunk.len()]);
            v_add_u64(&mut data[..sl], 1);
        }
        Ok(())
    }
}

impl Mechanism for HashDrbg {
    fn seed_len(&self) -> usize {
        seed_len(self.alg)
    }

    /// Hash_DRBG_Instantiate (SP 800-90A §10.1.1.2).
    fn instantiate(
        &mut self,
        entropy: &[u8],
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<(), CryptoError> {
        let sl = seed_len(self.alg);
        // V = Hash_df(entropy ‖ nonce ‖ personalization, seedlen)
        hash_df(self.alg, &[entropy, nonce, personalization], &mut self.v[..sl])?;
        self.derive_constant()
    }

    /// Hash_DRBG_Reseed (SP 800-90A §10.1.1.3).
    fn reseed(&mut self, entropy: &[u8], additional: &[u8]) -> Result<(), CryptoError> {
        let sl = seed_len(self.alg);
        // V = Hash_df(0x01 ‖ V ‖ entropy ‖ additional, seedlen)
        let old_v = Zeroizing::new(self.v);
        hash_df(
            self.alg,
            &[&[0x01u8], &old_v[..sl], entropy, additional],
            &mut self.v[..sl],
        )?;
        self.derive_constant()
    }

    /// Hash_DRBG_Generate (SP 800-90A §10.1.1.4).
    fn generate(&mut self, out: &mut [u8], additional: &[u8]) -> Result<(), CryptoError> {
        let sl = seed_len(self.alg);
        let hl = self.alg.output_size();
        let mut w = Zeroizing::new([0u8; MAX_OUT_LEN]);

        // Step 2: w = Hash(0x02 ‖ V ‖ additional); V = V + w
        if !additional.is_empty() {
            hash_into(self.alg, &[&[0x02u8], &self.v[..sl], additional], &mut w)?;
            v_add(&mut self.v[..sl], &w[..hl]);
        }

        // Step 3
        self.hashgen(out)?;

        // Step 4-5: H = Hash(0x03 ‖ V); V = V + H + C + reseed_counter
        hash_into(self.alg, &[&[0x03u8], &self.v[..sl]], &mut w)?;
        v_add(&mut self.v[..sl], &w[..hl]);
        v_add(&mut self.v[..sl], &self.c[..sl]);
        v_add_u64(&mut self.v[..sl], self.reseed_counter);
        self.reseed_counter += 1;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.v.zeroize();
        self.c.zeroize();
        self.reseed_counter = 0;
    }

    fn is_zeroized(&self) -> bool {
        self.reseed_counter == 0 && self.v.iter().chain(self.c.iter()).all(|&b| b == 0)
    }
}

impl Drop for HashDrbg {
    fn drop(&mut self) {
        self.cleanup();
    }
}
