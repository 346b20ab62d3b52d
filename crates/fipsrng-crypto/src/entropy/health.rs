//! Online health tests and entropy estimators for noise samples.
//!
//! - **Repetition Count Test** and **Adaptive Proportion Test**
//!   (NIST SP 800-90B §4.4), run per sample by the FIPS noise driver.
//! - **Block estimator**: most-common-value min-entropy estimate over a
//!   512-byte block, integer arithmetic, reported on a ×2 scale so half-bit
//!   steps are representable (200 = 8 bits/byte).
//! - **Nibble estimator**: the same idea over 4-bit symbols for a conditioned
//!   32-byte block, reported as a percentage in steps of 25.
//! - **Long-term estimator**: running byte-histogram estimate over
//!   successive windows of conditioned output, 0–100.

use fipsrng_types::CryptoError;

/// Default RCT cutoff for H=1.0, α=2⁻²⁰: C = 1 + ⌈20/1.0⌉ = 21.
pub const DEFAULT_RCT_CUTOFF: u32 = 21;

/// Default APT window size.
pub const DEFAULT_APT_WINDOW: u32 = 512;

/// Default APT cutoff for H=1.0, W=512, α=2⁻²⁰.
pub const DEFAULT_APT_CUTOFF: u32 = 410;

/// Length of the block the block estimator works on.
pub const ESTIMATE_BLOCK_LEN: usize = 512;

/// Minimum input for the nibble estimator.
pub const NIBBLE_MIN_LEN: usize = 32;

/// Default long-term estimator window in bytes.
pub const DEFAULT_LONG_TERM_WINDOW: usize = 1024;

/// Repetition Count Test (SP 800-90B §4.4.1).
pub struct RctTest {
    /// Run length C at which the test fails.
    cutoff: u32,
    /// Length of the current run of `last` (B).
    run: u32,
    /// Most recent sample (A); `None` before the first one.
    last: Option<u8>,
}

impl RctTest {
    pub fn new(cutoff: u32) -> Self {
        RctTest {
            cutoff,
            run: 0,
            last: None,
        }
    }

    /// Fails once the same sample has been seen `cutoff` times in a row.
    pub fn test(&mut self, sample: u8) -> Result<(), CryptoError> {
        if self.last == Some(sample) {
            self.run += 1;
            if self.run >= self.cutoff {
                return Err(CryptoError::EntropyRctFailure);
            }
        } else {
            self.last = Some(sample);
            self.run = 1;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.run = 0;
        self.last = None;
    }
}

/// Adaptive Proportion Test (SP 800-90B §4.4.2).
///
/// The first sample of each window is the reference; the window fails if
/// the reference value reaches `cutoff` occurrences.
pub struct AptTest {
    /// Samples per window (W).
    window: u32,
    /// Reference occurrences within a window at which the test fails.
    cutoff: u32,
    /// Samples seen in the current window, reference included.
    seen: u32,
    /// Occurrences of the reference in the current window (B).
    hits: u32,
    /// First sample of the current window; `None` between windows.
    reference: Option<u8>,
}

impl AptTest {
    pub fn new(window: u32, cutoff: u32) -> Self {
        AptTest {
            window,
            cutoff,
            seen: 0,
            hits: 0,
            reference: None,
        }
    }

    pub fn test(&mut self, sample: u8) -> Result<(), CryptoError> {
        let reference = match self.reference {
            Some(r) => r,
            None => {
                self.reference = Some(sample);
                self.seen = 1;
                self.hits = 1;
                return Ok(());
            }
        };

        if sample == reference {
            self.hits += 1;
            if self.hits >= self.cutoff {
                return Err(CryptoError::EntropyAptFailure);
            }
        }
        self.seen += 1;
        if self.seen >= self.window {
            self.reset();
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.seen = 0;
        self.hits = 0;
        self.reference = None;
    }
}

/// RCT and APT run together on every sample.
pub struct HealthTest {
    pub rct: RctTest,
    pub apt: AptTest,
}

impl HealthTest {
    pub fn new(rct_cutoff: u32, apt_window: u32, apt_cutoff: u32) -> Self {
        HealthTest {
            rct: RctTest::new(rct_cutoff),
            apt: AptTest::new(apt_window, apt_cutoff),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_RCT_CUTOFF, DEFAULT_APT_WINDOW, DEFAULT_APT_CUTOFF)
    }

    pub fn test_sample(&mut self, sample: u8) -> Result<(), CryptoError> {
        self.rct.test(sample)?;
        self.apt.test(sample)
    }

    pub fn reset(&mut self) {
        self.rct.reset();
        self.apt.reset();
    }
}

fn max_count<const N: usize>(counts: &[u32; N]) -> u32 {
    counts.iter().copied().max().unwrap_or(0)
}

/// Most-common-value estimate of a block, ×2 scale (0..=200).
///
/// Returns 0 for blocks shorter than [`ESTIMATE_BLOCK_LEN`].
pub fn block_estimate(block: &[u8]) -> u32 {
    if block.len() < ESTIMATE_BLOCK_LEN {
        return 0;
    }
    let mut counts = [0u32; 256];
    for &b in block {
        counts[b as usize] += 1;
    }
    let k = max_count(&counts) as usize;
    // k >= 1 since the block is non-empty
    let ratio = block.len() / k;
    25 * ratio.ilog2().min(8)
}

/// Most-common-value estimate over 4-bit symbols, percent in steps of 25.
///
/// Returns 0 for inputs shorter than [`NIBBLE_MIN_LEN`].
pub fn nibble_estimate(data: &[u8]) -> u32 {
    if data.len() < NIBBLE_MIN_LEN {
        return 0;
    }
    let mut counts = [0u32; 16];
    for &b in data {
        counts[(b >> 4) as usize] += 1;
        counts[(b & 0x0f) as usize] += 1;
    }
    let k = max_count(&counts) as usize;
    let ratio = (data.len() * 2) / k;
    25 * ratio.ilog2().min(4)
}

/// Running estimate of the conditioned output quality.
///
/// Accumulates a byte histogram; each time `window` bytes have been seen
/// the estimate is recomputed (0–100) and the histogram restarts.
pub struct LongTermEstimator {
    /// Byte histogram of the current window.
    counts: [u32; 256],
    /// Bytes fed into the current window.
    total: usize,
    /// Window length in bytes.
    window: usize,
    /// Estimate from the last completed window, 0–100.
    estimate: u32,
}

impl LongTermEstimator {
    pub fn new(window: usize) -> Self {
        LongTermEstimator {
            counts: [0u32; 256],
            total: 0,
            window: window.max(ESTIMATE_BLOCK_LEN),
            estimate: 100,
        }
    }

    pub fn feed(&mut self, data: &[u8]) {
        for &b in data {
            self.counts[b as usize] += 1;
            self.total += 1;
            if self.total >= self.window {
                let k = max_count(&self.counts) as usize;
                let ratio = self.total / k;
                self.estimate = 100 * ratio.ilog2().min(8) / 8;
                self.counts = [0u32; 256];
                self.total = 0;
            }
        }
    }

    /// Current estimate, 100 until the first window completes.
    pub fn estimate(&self) -> u32 {
        self.estimate
    }

    /// True while the estimate stays above `100 / design_entropy`.
    pub fn is_ok(&self, design_entropy: u32) -> bool {
        self.estimate > 100 / design_entropy.max(1)
    }
}
