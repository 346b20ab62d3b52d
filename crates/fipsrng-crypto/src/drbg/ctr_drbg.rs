//! CTR_DRBG (Counter-mode Deterministic Random Bit Generator).
//!
//! Implements NIST SP 800-90A Section 10.2 over AES-128/192/256, always
//! with the Block_Cipher_df derivation function (Section 10.3.2), so
//! entropy, nonce, personalization and additional input may be of any
//! length up to the descriptor limits.

use super::Mechanism;
use crate::block::AES_BLOCK_SIZE;
use crate::provider::{BlockCipher, Primitive};
use fipsrng_types::{CipherAlgId, CryptoError};
use zeroize::{Zeroize, Zeroizing};

/// Block size in bytes, the same for every AES key size.
const BLOCK_LEN: usize = AES_BLOCK_SIZE;
/// Largest key length (AES-256).
const MAX_KEY_LEN: usize = 32;
/// Largest seed length: key length + block length.
pub const MAX_SEED_LEN: usize = MAX_KEY_LEN + BLOCK_LEN;

/// Increment a 128-bit counter (big-endian).
fn increment_counter(v: &mut [u8; BLOCK_LEN]) {
    for i in (0..BLOCK_LEN).rev() {
        v[i] = v[i].wrapping_add(1);
        if v[i] != 0 {
            break;
        }
    }
}

/// Seed length for `alg`: 32, 40 or 48 bytes.
pub fn seed_len(alg: CipherAlgId) -> usize {
    alg.key_len() + BLOCK_LEN
}

/// CTR_DRBG working state.
pub struct CtrDrbg {
    alg: CipherAlgId,
    /// Key; only the first `alg.key_len()` bytes are used.
    key: [u8; MAX_KEY_LEN],
    /// Counter block V.
    v: [u8; BLOCK_LEN],
    /// Cipher keyed with the current `key`.
    cipher: Option<Box<dyn BlockCipher>>,
}

impl CtrDrbg {
    pub fn new(alg: CipherAlgId) -> Self {
        CtrDrbg {
            alg,
            key: [0u8; MAX_KEY_LEN],
            v: [0u8; BLOCK_LEN],
            cipher: None,
        }
    }

    fn key_len(&self) -> usize {
        self.alg.key_len()
    }

    fn rekey(&mut self) -> Result<(), CryptoError> {
        let kl = self.key_len();
        self.cipher = Some(Primitive::Cipher(self.alg).new_cipher(&self.key[..kl])?);
        Ok(())
    }

    /// CTR_DRBG_Update (SP 800-90A §10.2.1.2). `provided` is exactly seedlen bytes.
    fn update(&mut self, provided: &[u8]) -> Result<(), CryptoError> {
        let kl = self.key_len();
        let sl = kl + BLOCK_LEN;
        if provided.len() != sl {
            return Err(CryptoError::InvalidArg);
        }
        let cipher = self.cipher.as_deref().ok_or(CryptoError::DrbgInvalidState)?;

        // Step 2: temp = E(K, V+1) ‖ E(K, V+2) ‖ … truncated to seedlen
        let mut temp = Zeroizing::new([0u8; MAX_SEED_LEN]);
        let mut offset = 0;
        while offset < sl {
            increment_counter(&mut self.v);
            let mut block = self.v;
            cipher.encrypt_block(&mut block)?;
            let n = (sl - offset).min(BLOCK_LEN);
            temp[offset..offset + n].copy_from_slice(&block[..n]);
            block.zeroize();
            offset += n;
        }

        // Step 4: temp ^= provided_data
        for (t, p) in temp[..sl].iter_mut().zip(provided) {
            *t ^= p;
        }

        // Steps 5-6: split into Key and V
        self.key[..kl].copy_from_slice(&temp[..kl]);
        self.v.copy_from_slice(&temp[kl..sl]);
        self.rekey()
    }
}

impl Mechanism for CtrDrbg {
    fn seed_len(&self) -> usize {
        seed_len(self.alg)
    }

    /// CTR_DRBG_Instantiate with df (SP 800-90A §10.2.1.3.2).
    fn instantiate(
        &mut self,
        entropy: &[u8],
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<(), CryptoError> {
        let sl = self.seed_len();
        let mut seed = Zeroizing::new([0u8; MAX_SEED_LEN]);
        block_cipher_df(self.alg, &[entropy, nonce, personalization], &mut seed[..sl])?;

        self.key.zeroize();
        self.v.zeroize();
        self.rekey()?;
        self.update(&seed[..sl])
    }

    /// CTR_DRBG_Reseed with df (SP 800-90A §10.2.1.4.2).
    fn reseed(&mut self, entropy: &[u8], additional: &[u8]) -> Result<(), CryptoError> {
        let sl = self.seed_len();
        let mut seed = Zeroizing::new([0u8; MAX_SEED_LEN]);
        block_cipher_df(self.alg, &[entropy, additional], &mut seed[..sl])?;
        self.update(&seed[..sl])
    }

    /// CTR_DRBG_Generate with df (SP 800-90A §10.2.1.5.2).
    ///
    /// Derived additional input feeds both the leading and the final update.
    fn generate(&mut self, out: &mut [u8], additional: &[u8]) -> Result<(), CryptoError> {
        let sl = self.seed_len();
        let mut add = Zeroizing::new([0u8; MAX_SEED_LEN]);
        if !additional.is_empty() {
            block_cipher_df(self.alg, &[additional], &mut add[..sl])?;
            self.update(&add[..sl])?;
        }

        let cipher = self.cipher.as_deref().ok_or(CryptoError::DrbgInvalidState)?;
        for chunk in out.chunks_mut(BLOCK_LEN) {
            increment_counter(&mut self.v);
            let mut block = self.v;
            cipher.encrypt_block(&mut block)?;
            chunk.copy_from_slice(&block[..chunk.len()]);
            block.zeroize();
        }

        self.update(&add[..sl])
    }

    fn cleanup(&mut self) {
        self.key.zeroize();
        self.v.zeroize();
        self.cipher = None;
    }

    fn is_zeroized(&self) -> bool {
        self.cipher.is_none() && self.key.iter().chain(self.v.iter()).all(|&b| b == 0)
    }
}

impl Drop for CtrDrbg {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Block_Cipher_df (SP 800-90A §10.3.2).
///
/// Compresses the concatenation of `parts` into `out.len()` bytes:
/// S = be32(L) ‖ be32(N) ‖ input ‖ 0x80 ‖ 0x00…; temp is BCC(K, IV_i ‖ S)
/// for IV_i = be32(i) ‖ 0¹², with K = 0x00 0x01 … ; the output is then
/// produced by encrypting X repeatedly under the new key taken from temp.
pub fn block_cipher_df(
    alg: CipherAlgId,
    parts: &[&[u8]],
    out: &mut [u8],
) -> Result<(), CryptoError> {
    let kl = alg.key_len();
    let input_len: usize = parts.iter().map(|p| p.len()).sum();
    let l = u32::try_from(input_len).map_err(|_| CryptoError::InputOverflow)?;
    let n = u32::try_from(out.len()).map_err(|_| CryptoError::InputOverflow)?;

    // Step 1-4: S = L ‖ N ‖ input ‖ 0x80, zero-padded to a block multiple
    let mut s = Zeroizing::new(Vec::with_capacity(8 + input_len + BLOCK_LEN));
    s.extend_from_slice(&l.to_be_bytes());
    s.extend_from_slice(&n.to_be_bytes());
    for p in parts {
        s.extend_from_slice(p);
    }
    s.push(0x80);
    while s.len() % BLOCK_LEN != 0 {
        s.push(0x00);
    }

    // Step 8: K = leftmost keylen bytes of 0x00010203…
    let mut df_key = [0u8; MAX_KEY_LEN];
    for (i, b) in df_key.iter_mut().enumerate() {
        *b = i as u8;
    }
    let bcc_cipher = Primitive::Cipher(alg).new_cipher(&df_key[..kl])?;

    // Step 9-10: temp = BCC(K, IV_0 ‖ S) ‖ BCC(K, IV_1 ‖ S) ‖ …
    let needed = kl + BLOCK_LEN;
    let mut temp = Zeroizing::new([0u8; MAX_SEED_LEN]);
    let mut i: u32 = 0;
    while (i as usize) * BLOCK_LEN < needed {
        let mut chaining = [0u8; BLOCK_LEN];
        chaining[..4].copy_from_slice(&i.to_be_bytes());
        bcc_cipher.encrypt_block(&mut chaining)?;
        for chunk in s.chunks(BLOCK_LEN) {
            for (c, x) in chaining.iter_mut().zip(chunk) {
                *c ^= x;
            }
            bcc_cipher.encrypt_block(&mut chaining)?;
        }
        let at = i as usize * BLOCK_LEN;
        temp[at..at + BLOCK_LEN].copy_from_slice(&chaining);
        i += 1;
    }

    // Step 11-15: K = temp[..keylen], X = next block; output E(K, X) chain
    let out_cipher = Primitive::Cipher(alg).new_cipher(&temp[..kl])?;
    let mut x = [0u8; BLOCK_LEN];
    x.copy_from_slice(&temp[kl..kl + BLOCK_LEN]);
    for chunk in out.chunks_mut(BLOCK_LEN) {
        out_cipher.encrypt_block(&mut x)?;
        chunk.copy_from_slice(&x[..chunk.len()]);
    }
    x.zeroize();
    Ok(())
}
