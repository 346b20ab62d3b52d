//! HMAC-SHA256 conditioning of health-tested noise (NIST SP 800-90B §3.1.5.1).
//!
//! Each 32-byte granule is
//!
//! ```text
//! HMAC(key, chain ‖ diffuse(draw_1) ‖ … ‖ diffuse(draw_g) ‖ timing)
//! ```
//!
//! where `g` is the noise type's guarantee (draws per bit of claimed output
//! entropy), every draw is 32 health-tested bytes zero-extended to 64 and
//! XORed with the retained personalization block, and `timing` is the
//! MiniBuffer of timer samples taken between draws. The chaining value and
//! personalization block absorb every granule produced.

use super::health::{self, LongTermEstimator};
use super::minibuf::MiniBuffer;
use super::noise::NoiseSource;
use super::personalise::{self, PERSONALIZATION_LEN};
use super::{EntropyConfig, EntropySource};
use crate::hash;
use fipsrng_types::{CryptoError, HashAlgId, NoiseType};
use log::{debug, error, warn};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

/// Conditioner output block size.
pub const GRANULE_LEN: usize = 32;

/// Health-tested bytes per draw.
const DRAW_LEN: usize = 32;

/// A draw after zero-extension; also the retained personalization size.
const DIFFUSE_LEN: usize = 64;

/// Output of the conditioned source carries at least 1/DESIGN_ENTROPY
/// bits of entropy per bit.
pub const DESIGN_ENTROPY: u32 = 2;

/// Bytes thrown away when a source is drained after a fork.
pub const DRAIN_LEN: usize = 512;

/// Consecutive identical seeds tolerated before giving up.
const MAX_DUPLICATE_SEEDS: u32 = 5;

/// XOR the personalization block across a zero-extended draw.
fn diffuse(draw: &mut [u8; DIFFUSE_LEN], pers: &[u8; DIFFUSE_LEN]) {
    for (d, p) in draw.iter_mut().zip(pers.iter()) {
        *d ^= p;
    }
}

/// Repeated conditioner output means the noise path or the compression is
/// broken; no caller can recover from having handed out such bytes.
fn ensure_distinct(prev: Option<&[u8; GRANULE_LEN]>, next: &[u8; GRANULE_LEN]) {
    if let Some(prev) = prev {
        if bool::from(prev[..].ct_eq(&next[..])) {
            error!("entropy conditioner produced the same granule twice");
            panic!("entropy conditioner produced the same granule twice");
        }
    }
}

/// HMAC-SHA256 compression of health-tested draws into granules.
pub struct Conditioner {
    /// HMAC key, fixed at setup.
    key: [u8; 32],
    /// Chaining value; XORed with every granule produced.
    chain: [u8; GRANULE_LEN],
    /// Diffusion block; starts as folded personalization, absorbs granules.
    pers: [u8; DIFFUSE_LEN],
    /// Timer samples merged between draws.
    timing: MiniBuffer,
    /// Last granule, for the repeat check.
    prev: Option<[u8; GRANULE_LEN]>,
    /// Health-tested draws per granule.
    guarantee: usize,
}

impl Conditioner {
    /// Set up the conditioner key and chaining value from `personalization`.
    ///
    /// key = HMAC(0³², personalization), chain = HMAC(key, personalization);
    /// the personalization is folded into the 64-byte diffusion block.
    pub fn new(guarantee: usize, personalization: &[u8]) -> Result<Self, CryptoError> {
        let mut key = [0u8; 32];
        let mut chain = [0u8; GRANULE_LEN];
        let derived = Zeroizing::new(hash::hmac(HashAlgId::Sha256, &[0u8; 32], &[personalization])?);
        key.copy_from_slice(&derived);
        let derived = Zeroizing::new(hash::hmac(HashAlgId::Sha256, &key, &[personalization])?);
        chain.copy_from_slice(&derived);

        let mut pers = [0u8; DIFFUSE_LEN];
        for (i, b) in personalization.iter().enumerate() {
            pers[i % DIFFUSE_LEN] ^= b;
        }

        Ok(Conditioner {
            key,
            chain,
            pers,
            timing: MiniBuffer::new(),
            prev: None,
            guarantee: guarantee.max(1),
        })
    }

    pub fn guarantee(&self) -> usize {
        self.guarantee
    }

    fn stamp(&mut self) {
        let c = personalise::counter();
        self.timing.merge((c as u8) ^ ((c >> 8) as u8));
    }

    /// Produce one granule from `source`.
    ///
    /// # Panics
    ///
    /// If the granule equals the one produced immediately before it.
    pub fn granule(&mut self, source: &mut EntropySource) -> Result<[u8; GRANULE_LEN], CryptoError> {
        let mut mac = hash::new_hmac(HashAlgId::Sha256, &self.key)?;
        mac.update(&self.chain)?;

        let mut draw = Zeroizing::new([0u8; DIFFUSE_LEN]);
        for _ in 0..self.guarantee {
            draw.zeroize();
            source.get_health_tested(&mut draw[..DRAW_LEN])?;
            self.stamp();
            diffuse(&mut draw, &self.pers);
            mac.update(&draw[..])?;
        }
        mac.update(self.timing.as_bytes())?;

        let mut out = [0u8; GRANULE_LEN];
        mac.finish(&mut out)?;
        ensure_distinct(self.prev.as_ref(), &out);
        self.prev = Some(out);

        for (c, g) in self.chain.iter_mut().zip(out.iter()) {
            *c ^= g;
        }
        for (i, p) in self.pers.iter_mut().enumerate() {
            *p ^= out[i % GRANULE_LEN];
        }
        Ok(out)
    }

    /// Fill `out` with conditioned bytes.
    pub fn fill(&mut self, source: &mut EntropySource, out: &mut [u8]) -> Result<(), CryptoError> {
        for chunk in out.chunks_mut(GRANULE_LEN) {
            let g = Zeroizing::new(self.granule(source)?);
            chunk.copy_from_slice(&g[..chunk.len()]);
        }
        Ok(())
    }
}

impl Drop for Conditioner {
    fn drop(&mut self) {
        self.key.zeroize();
        self.chain.zeroize();
        self.pers.zeroize();
        if let Some(p) = self.prev.as_mut() {
            p.zeroize();
        }
    }
}

/// A conditioned seed source: health-tested noise, the conditioner, and
/// output checks on everything it hands to a DRBG.
pub struct Trng {
    source: EntropySource,
    cond: Conditioner,
    /// Quality of everything handed out so far.
    long_term: LongTermEstimator,
    /// SHA-256 of the previous seed.
    last_digest: Option<Vec<u8>>,
    config: EntropyConfig,
}

impl Trng {
    /// A seed source over the default driver for `t`.
    pub fn new(t: NoiseType) -> Result<Self, CryptoError> {
        Self::with_config(t, EntropyConfig::default())
    }

    pub fn with_config(t: NoiseType, config: EntropyConfig) -> Result<Self, CryptoError> {
        let source = EntropySource::new(t, config.clone());
        Self::from_source(source, config)
    }

    /// A seed source over a caller-provided driver.
    pub fn with_source(source: Box<dyn NoiseSource>, config: EntropyConfig) -> Result<Self, CryptoError> {
        let source = EntropySource::with_source(source, config.clone());
        Self::from_source(source, config)
    }

    fn from_source(source: EntropySource, config: EntropyConfig) -> Result<Self, CryptoError> {
        let pers = Zeroizing::new(personalise::personalization());
        let cond = Conditioner::new(source.noise_type().guarantee(), &pers[..PERSONALIZATION_LEN])?;
        debug!(
            "trng: bound {} source ({}), guarantee {}",
            source.noise_type(),
            source.name(),
            cond.guarantee()
        );
        Ok(Trng {
            long_term: LongTermEstimator::new(config.long_term_window),
            source,
            cond,
            last_digest: None,
            config,
        })
    }

    pub fn noise_type(&self) -> NoiseType {
        self.source.noise_type()
    }

    /// Bits of conditioned output per bit of entropy claimed.
    pub fn design_entropy(&self) -> u32 {
        DESIGN_ENTROPY
    }

    /// Running 0–100 estimate of the conditioned output.
    pub fn estimate(&self) -> u32 {
        self.long_term.estimate()
    }

    /// Fill `out` with a seed.
    ///
    /// Every 32-byte conditioned block must pass the nibble estimator, the
    /// long-term estimate must stay acceptable, and the seed must not repeat
    /// the previous one.
    pub fn generate_seed(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        if out.is_empty() {
            return Ok(());
        }
        let mut repeats = 0u32;
        loop {
            if let Err(e) = self.fill_checked(out) {
                out.zeroize();
                return Err(e);
            }

            self.long_term.feed(out);
            if !self.long_term.is_ok(DESIGN_ENTROPY) {
                out.zeroize();
                warn!("trng: long-term estimate {} below limit", self.long_term.estimate());
                return Err(CryptoError::EntropyLongTermFailure);
            }

            if self.record_if_fresh(out)? {
                return Ok(());
            }
            repeats += 1;
            warn!("trng: duplicate seed ({repeats})");
            if repeats > MAX_DUPLICATE_SEEDS {
                out.zeroize();
                return Err(CryptoError::EntropyDuplicateSeed);
            }
        }
    }

    fn fill_checked(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let mut filled = 0;
        let mut rejected = 0u32;
        while filled < out.len() {
            let block = Zeroizing::new(self.cond.granule(&mut self.source)?);
            let e = health::nibble_estimate(&block[..]);
            if e < self.config.min_conditioned_estimate {
                rejected += 1;
                warn!("trng: conditioned block estimate {e} rejected");
                if rejected >= self.config.conditioner_retries {
                    return Err(CryptoError::EntropyLowEstimate);
                }
                continue;
            }
            let k = (out.len() - filled).min(GRANULE_LEN);
            out[filled..filled + k].copy_from_slice(&block[..k]);
            filled += k;
        }
        Ok(())
    }

    /// Remember the digest of `seed`; false if it matches the previous one.
    fn record_if_fresh(&mut self, seed: &[u8]) -> Result<bool, CryptoError> {
        let d = hash::digest(HashAlgId::Sha256, &[seed])?;
        if self.last_digest.as_deref() == Some(&d[..]) {
            return Ok(false);
        }
        self.last_digest = Some(d);
        Ok(true)
    }

    /// Discard staged noise plus one block of fresh conditioned output.
    pub fn drain(&mut self) -> Result<(), CryptoError> {
        self.source.flush();
        let mut scratch = Zeroizing::new([0u8; DRAIN_LEN]);
        self.cond.fill(&mut self.source, &mut scratch[..])
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_sources::{DeadNoise, PatternNoise};
    use super::*;

    fn pattern_trng() -> Trng {
        Trng::with_source(Box::new(PatternNoise::spread(256)), EntropyConfig::default()).unwrap()
    }

    #[test]
    fn test_conditioner_fill_lengths() {
        let mut src = EntropySource::with_source(
            Box::new(PatternNoise::spread(256)),
            EntropyConfig::default(),
        );
        let mut cond = Conditioner::new(2, b"conditioner test").unwrap();
        for len in [0usize, 1, 31, 32, 33, 100] {
            let mut out = vec![0u8; len];
            cond.fill(&mut src, &mut out).unwrap();
            if len > 0 {
                assert!(out.iter().any(|&b| b != 0));
            }
        }
    }

    #[test]
    fn test_conditioner_granules_differ() {
        let mut src = EntropySource::with_source(
            Box::new(PatternNoise::spread(256)),
            EntropyConfig::default(),
        );
        let mut cond = Conditioner::new(4, b"").unwrap();
        let a = cond.granule(&mut src).unwrap();
        let b = cond.granule(&mut src).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_conditioner_propagates_source_failure() {
        let mut src = EntropySource::with_source(Box::new(DeadNoise), EntropyConfig::default());
        let mut cond = Conditioner::new(2, b"x").unwrap();
        let mut out = [0u8; 32];
        assert_eq!(
            cond.fill(&mut src, &mut out),
            Err(CryptoError::EntropyLowEstimate)
        );
    }

    #[test]
    #[should_panic(expected = "same granule twice")]
    fn test_repeated_granule_is_fatal() {
        let g = [0x5Au8; GRANULE_LEN];
        ensure_distinct(Some(&g), &g);
    }

    #[test]
    fn test_distinct_granules_pass() {
        ensure_distinct(None, &[0u8; GRANULE_LEN]);
        ensure_distinct(Some(&[0u8; GRANULE_LEN]), &[1u8; GRANULE_LEN]);
    }

    #[test]
    fn test_diffuse_xors_personalization() {
        let mut draw = [0u8; DIFFUSE_LEN];
        draw[0] = 0xF0;
        let mut pers = [0u8; DIFFUSE_LEN];
        pers[0] = 0x0F;
        pers[63] = 0x11;
        diffuse(&mut draw, &pers);
        assert_eq!(draw[0], 0xFF);
        assert_eq!(draw[63], 0x11);
    }

    #[test]
    fn test_trng_generate_seed_os() {
        let mut trng = Trng::new(NoiseType::Os).unwrap();
        let mut a = [0u8; 48];
        let mut b = [0u8; 48];
        trng.generate_seed(&mut a).unwrap();
        trng.generate_seed(&mut b).unwrap();
        assert_ne!(a, b);
        assert_eq!(trng.noise_type(), NoiseType::Os);
        assert_eq!(trng.design_entropy(), 2);
    }

    #[test]
    fn test_trng_empty_request() {
        let mut trng = pattern_trng();
        trng.generate_seed(&mut []).unwrap();
    }

    #[test]
    fn test_trng_estimate_starts_at_100() {
        let mut trng = pattern_trng();
        assert_eq!(trng.estimate(), 100);
        let mut seed = vec![0u8; 2048];
        trng.generate_seed(&mut seed).unwrap();
        assert!(trng.estimate() > 50);
    }

    #[test]
    fn test_trng_long_term_failure() {
        let mut trng = pattern_trng();
        trng.long_term.feed(&[0u8; health::DEFAULT_LONG_TERM_WINDOW]);
        let mut seed = [0u8; 32];
        assert_eq!(
            trng.generate_seed(&mut seed),
            Err(CryptoError::EntropyLongTermFailure)
        );
        assert!(seed.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_trng_duplicate_seed_detected() {
        let mut trng = pattern_trng();
        assert!(trng.record_if_fresh(b"seed").unwrap());
        assert!(!trng.record_if_fresh(b"seed").unwrap());
        assert!(trng.record_if_fresh(b"other").unwrap());
    }

    #[test]
    fn test_trng_dead_source() {
        let mut trng =
            Trng::with_source(Box::new(DeadNoise), EntropyConfig::default()).unwrap();
        let mut seed = [0u8; 16];
        assert_eq!(
            trng.generate_seed(&mut seed),
            Err(CryptoError::EntropyLowEstimate)
        );
    }

    #[test]
    fn test_trng_drain() {
        let mut trng = pattern_trng();
        trng.drain().unwrap();
        let mut seed = [0u8; 32];
        trng.generate_seed(&mut seed).unwrap();
    }
}
