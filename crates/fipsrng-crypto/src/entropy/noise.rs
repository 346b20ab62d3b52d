//! Noise drivers.
//!
//! A driver only produces raw bytes; estimation and conditioning happen in
//! [`EntropySource`](super::EntropySource) and the conditioner.

use super::health::HealthTest;
use super::minibuf::MiniBuffer;
use fipsrng_types::{CryptoError, NoiseType};
use std::hint::black_box;
use std::time::Instant;

/// Trait for pluggable noise sources.
pub trait NoiseSource: Send {
    /// Human-readable name of the noise source.
    fn name(&self) -> &str;

    /// The entropy-source type this driver implements.
    fn noise_type(&self) -> NoiseType;

    /// Read raw noise bytes into `buf`. Returns the number of bytes written.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CryptoError>;
}

/// Operating-system generator, handed out a byte at a time through a
/// [`MiniBuffer`] so the syscall happens once per 64 bytes.
pub struct OsNoise {
    staging: MiniBuffer,
}

impl OsNoise {
    pub fn new() -> Self {
        OsNoise {
            staging: MiniBuffer::new(),
        }
    }
}

impl Default for OsNoise {
    fn default() -> Self {
        Self::new()
    }
}

fn os_fill(buf: &mut [u8]) -> Result<(), CryptoError> {
    getrandom::getrandom(buf).map_err(|e| CryptoError::NoiseSourceUnavailable(e.to_string()))
}

impl NoiseSource for OsNoise {
    fn name(&self) -> &str {
        "os"
    }

    fn noise_type(&self) -> NoiseType {
        NoiseType::Os
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CryptoError> {
        for b in buf.iter_mut() {
            *b = self.staging.get(os_fill)?;
        }
        Ok(buf.len())
    }
}

/// Timer samples folded into each output byte.
const JITTER_ROUNDS: usize = 16;

/// High-resolution timer jitter sampler.
///
/// Each byte folds the low bits of [`JITTER_ROUNDS`] successive timer deltas,
/// with a short data-dependent busy loop between samples.
pub struct JitterNoise {
    origin: Instant,
    last: u64,
    scratch: u64,
}

impl JitterNoise {
    pub fn new() -> Self {
        JitterNoise {
            origin: Instant::now(),
            last: 0,
            scratch: 0x9e37_79b9_7f4a_7c15,
        }
    }

    fn sample_byte(&mut self) -> u8 {
        let mut acc = 0u8;
        for _ in 0..JITTER_ROUNDS {
            let now = self.origin.elapsed().as_nanos() as u64;
            let delta = now.wrapping_sub(self.last);
            self.last = now;
            acc = acc.rotate_left(3) ^ (delta as u8) ^ ((delta >> 8) as u8);
            for i in 0..(delta & 0x0f) {
                self.scratch = black_box(self.scratch.rotate_left(7) ^ i);
            }
        }
        acc
    }
}

impl Default for JitterNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseSource for JitterNoise {
    fn name(&self) -> &str {
        "jitter"
    }

    fn noise_type(&self) -> NoiseType {
        NoiseType::Hw
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CryptoError> {
        for b in buf.iter_mut() {
            *b = self.sample_byte();
        }
        Ok(buf.len())
    }
}

/// Jitter sampler with SP 800-90B continuous health tests on every sample.
pub struct FipsNoise {
    inner: JitterNoise,
    health: HealthTest,
}

impl FipsNoise {
    pub fn new() -> Self {
        Self::with_health(HealthTest::with_defaults())
    }

    pub fn with_health(health: HealthTest) -> Self {
        FipsNoise {
            inner: JitterNoise::new(),
            health,
        }
    }
}

impl Default for FipsNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseSource for FipsNoise {
    fn name(&self) -> &str {
        "fips-jitter"
    }

    fn noise_type(&self) -> NoiseType {
        NoiseType::Fips
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CryptoError> {
        for b in buf.iter_mut() {
            let sample = self.inner.sample_byte();
            if let Err(e) = self.health.test_sample(sample) {
                self.health.reset();
                return Err(e);
            }
            *b = sample;
        }
        Ok(buf.len())
    }
}

/// Build the driver for `t`.
pub fn noise_for(t: NoiseType) -> Box<dyn NoiseSource> {
    match t {
        NoiseType::Hw => Box::new(JitterNoise::new()),
        NoiseType::Os => Box::new(OsNoise::new()),
        NoiseType::Fips => Box::new(FipsNoise::new()),
    }
}
