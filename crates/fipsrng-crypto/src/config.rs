//! Process configuration for the generator pool.
//!
//! Defaults can be overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `FIPSRNG_ALG` | algorithm name |
//! | `FIPSRNG_STRENGTH` | requested strength in bits, 0 = highest |
//! | `FIPSRNG_PREDICTION_RESISTANCE` | `1/0/true/false/yes/no` |
//! | `FIPSRNG_AUTO` | request chunking, same spellings |
//! | `FIPSRNG_INSTANCES` | pool lanes, clamped to 1..=256 |
//! | `FIPSRNG_TRNG` | noise type name, e.g. `TRNG_OS` |
//! | `FIPSRNG_EXCLUDE` | comma-separated algorithm names |

use fipsrng_types::{CryptoError, NoiseType};

/// Default pool lanes.
pub const DEFAULT_INSTANCES: usize = 7;

/// Largest pool.
pub const MAX_INSTANCES: usize = 256;

/// Settings consumed by [`RngPool`](crate::drbg::RngPool) and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RngConfig {
    pub algorithm: String,
    /// Requested strength in bits; 0 picks the algorithm's highest band.
    pub strength: u32,
    pub prediction_resistance: bool,
    pub auto_chunking: bool,
    pub instances: usize,
    pub noise_type: NoiseType,
    /// Comma-separated algorithm names to hide from lookup.
    pub exclude: String,
}

impl Default for RngConfig {
    fn default() -> Self {
        RngConfig {
            algorithm: "SHA256".to_string(),
            strength: 0,
            prediction_resistance: false,
            auto_chunking: true,
            instances: DEFAULT_INSTANCES,
            noise_type: NoiseType::Os,
            exclude: String::new(),
        }
    }
}

impl RngConfig {
    /// Defaults overlaid with the `FIPSRNG_*` environment variables.
    pub fn from_env() -> Result<Self, CryptoError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CryptoError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = RngConfig::default();
        if let Some(v) = lookup("FIPSRNG_ALG") {
            let v = v.trim();
            if v.is_empty() {
                return Err(CryptoError::InvalidArg);
            }
            cfg.algorithm = v.to_string();
        }
        if let Some(v) = lookup("FIPSRNG_STRENGTH") {
            cfg.strength = v.trim().parse().map_err(|_| CryptoError::InvalidArg)?;
        }
        if let Some(v) = lookup("FIPSRNG_PREDICTION_RESISTANCE") {
            cfg.prediction_resistance = parse_flag(&v)?;
        }
        if let Some(v) = lookup("FIPSRNG_AUTO") {
            cfg.auto_chunking = parse_flag(&v)?;
        }
        if let Some(v) = lookup("FIPSRNG_INSTANCES") {
            let n: usize = v.trim().parse().map_err(|_| CryptoError::InvalidArg)?;
            cfg.instances = clamp_instances(n);
        }
        if let Some(v) = lookup("FIPSRNG_TRNG") {
            cfg.noise_type = NoiseType::from_name(&v)?;
        }
        if let Some(v) = lookup("FIPSRNG_EXCLUDE") {
            cfg.exclude = v;
        }
        Ok(cfg)
    }
}

/// Clamp a lane count into 1..=256.
pub fn clamp_instances(n: usize) -> usize {
    n.clamp(1, MAX_INSTANCES)
}

fn parse_flag(v: &str) -> Result<bool, CryptoError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(CryptoError::InvalidArg),
    }
}
