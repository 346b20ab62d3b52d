//! Entropy source with health testing (NIST SP 800-90B).
//!
//! The pipeline, leaves first:
//! 1. A pluggable [`NoiseSource`] driver produces raw bytes.
//! 2. [`EntropySource`] reads them a block at a time, estimates each block
//!    and only exposes blocks that pass.
//! 3. [`Conditioner`] compresses health-tested draws with HMAC-SHA256.
//! 4. [`Trng`] checks conditioned output and serves DRBG seed requests.
//!
//! # Example
//!
//! ```
//! use fipsrng_crypto::entropy::Trng;
//! use fipsrng_types::NoiseType;
//!
//! let mut trng = Trng::new(NoiseType::Os).unwrap();
//! let mut seed = [0u8; 48];
//! trng.generate_seed(&mut seed).expect("entropy acquisition failed");
//! ```

pub mod conditioning;
pub mod health;
pub mod minibuf;
pub mod noise;
pub mod personalise;

pub use conditioning::{Conditioner, Trng};
pub use health::{AptTest, HealthTest, LongTermEstimator, RctTest};
pub use minibuf::MiniBuffer;
pub use noise::{FipsNoise, JitterNoise, NoiseSource, OsNoise};

use fipsrng_types::{CryptoError, NoiseType};
use log::warn;
use zeroize::Zeroize;

/// Configuration for the entropy pipeline.
#[derive(Debug, Clone)]
pub struct EntropyConfig {
    /// Raw block size the block estimator runs on. Default: 512.
    pub block_len: usize,
    /// Minimum acceptable block estimate, ×2 scale. Default: 100 (4 bits/byte).
    pub min_block_estimate: u32,
    /// Consecutive rejected blocks tolerated before a read fails. Default: 9.
    pub max_health_failures: u32,
    /// Conditioned blocks that may be rejected per seed request. Default: 5.
    pub conditioner_retries: u32,
    /// Minimum nibble estimate of a conditioned block. Default: 50.
    pub min_conditioned_estimate: u32,
    /// Long-term estimator window in bytes. Default: 1024.
    pub long_term_window: usize,
    /// RCT cutoff for the FIPS driver. Default: 21 (H=1.0, α=2⁻²⁰).
    pub rct_cutoff: u32,
    /// APT window size for the FIPS driver. Default: 512.
    pub apt_window_size: u32,
    /// APT cutoff for the FIPS driver. Default: 410.
    pub apt_cutoff: u32,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        EntropyConfig {
            block_len: health::ESTIMATE_BLOCK_LEN,
            min_block_estimate: 100,
            max_health_failures: 9,
            conditioner_retries: 5,
            min_conditioned_estimate: 50,
            long_term_window: health::DEFAULT_LONG_TERM_WINDOW,
            rct_cutoff: health::DEFAULT_RCT_CUTOFF,
            apt_window_size: health::DEFAULT_APT_WINDOW,
            apt_cutoff: health::DEFAULT_APT_CUTOFF,
        }
    }
}

/// A noise driver plus the block staging and failure accounting in front of it.
pub struct EntropySource {
    source: Box<dyn NoiseSource>,
    block: Vec<u8>,
    /// Unread bytes at the tail of `block`.
    available: usize,
    /// Consecutive rejected blocks.
    failures: u32,
    config: EntropyConfig,
}

impl EntropySource {
    /// Create an entropy source over the default driver for `t`.
    pub fn new(t: NoiseType, config: EntropyConfig) -> Self {
        let source: Box<dyn NoiseSource> = match t {
            NoiseType::Fips => Box::new(FipsNoise::with_health(HealthTest::new(
                config.rct_cutoff,
                config.apt_window_size,
                config.apt_cutoff,
            ))),
            other => noise::noise_for(other),
        };
        Self::with_source(source, config)
    }

    pub fn with_source(source: Box<dyn NoiseSource>, config: EntropyConfig) -> Self {
        let block_len = config.block_len.max(health::ESTIMATE_BLOCK_LEN);
        EntropySource {
            source,
            block: vec![0u8; block_len],
            available: 0,
            failures: 0,
            config,
        }
    }

    pub fn noise_type(&self) -> NoiseType {
        self.source.noise_type()
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Unread health-tested bytes currently staged.
    pub fn available(&self) -> usize {
        self.available
    }

    /// Fill `out` with bytes from blocks that passed the estimator.
    ///
    /// A rejected block is discarded without being read from and counts as a
    /// consecutive failure; more than `max_health_failures` in a row fails
    /// the request with [`CryptoError::EntropyLowEstimate`].
    pub fn get_health_tested(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let mut filled = 0;
        while filled < out.len() {
            if self.available == 0 {
                if !self.refill() {
                    self.failures += 1;
                    if self.failures > self.config.max_health_failures {
                        self.failures = 0;
                        warn!(
                            "entropy source {}: too many consecutive low-entropy blocks",
                            self.source.name()
                        );
                        return Err(CryptoError::EntropyLowEstimate);
                    }
                }
                continue;
            }

            let len = self.block.len();
            let start = len - self.available;
            let k = (out.len() - filled).min(self.available);
            out[filled..filled + k].copy_from_slice(&self.block[start..start + k]);
            self.block[start..start + k].zeroize();
            filled += k;
            self.available -= k;
            self.failures = 0;
        }
        Ok(())
    }

    /// Read and estimate one block. Returns false if it was rejected.
    fn refill(&mut self) -> bool {
        self.available = 0;
        let mut offset = 0;
        while offset < self.block.len() {
            match self.source.read(&mut self.block[offset..]) {
                Ok(0) | Err(_) => {
                    self.block.as_mut_slice().zeroize();
                    return false;
                }
                Ok(n) => offset += n,
            }
        }
        let estimate = health::block_estimate(&self.block);
        if estimate < self.config.min_block_estimate {
            warn!(
                "entropy source {}: discarding block, estimate {} below {}",
                self.source.name(),
                estimate,
                self.config.min_block_estimate
            );
            self.block.as_mut_slice().zeroize();
            return false;
        }
        self.available = self.block.len();
        true
    }

    /// Drop any staged bytes.
    pub fn flush(&mut self) {
        // Wipe in place; the block keeps its length for the next refill.
        self.block.as_mut_slice().zeroize();
        self.available = 0;
    }
}

impl Drop for EntropySource {
    fn drop(&mut self) {
        self.block.zeroize();
    }
}
