//! Generate random bytes from a DRBG pool and output them as hex or base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fipsrng_crypto::config::RngConfig;
use fipsrng_crypto::drbg::RngPool;
use fipsrng_crypto::registry;
use fipsrng_types::set_default_noise_type;

/// Largest request served in one invocation.
const MAX_BYTES: usize = 1 << 20;

pub fn run(
    num: usize,
    format: &str,
    alg: Option<&str>,
    strength: Option<u32>,
    pr: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let out = generate(num, format, alg, strength, pr)?;
    println!("{out}");
    Ok(())
}

fn generate(
    num: usize,
    format: &str,
    alg: Option<&str>,
    strength: Option<u32>,
    pr: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    if num == 0 || num > MAX_BYTES {
        return Err(format!("num must be between 1 and {MAX_BYTES}").into());
    }
    if format != "hex" && format != "base64" {
        return Err(format!("unsupported format: {format} (use hex or base64)").into());
    }

    let mut cfg = RngConfig::from_env()?;
    if let Some(alg) = alg {
        cfg.algorithm = alg.to_string();
    }
    if let Some(strength) = strength {
        cfg.strength = strength;
    }
    cfg.prediction_resistance |= pr;
    // One request, one lane.
    cfg.instances = 1;

    set_default_noise_type(cfg.noise_type);
    registry::set_exclude_list(&cfg.exclude);
    let pool = RngPool::new(&cfg).map_err(|e| format!("cannot use {}: {e}", cfg.algorithm))?;

    let mut buf = vec![0u8; num];
    pool.fill(&mut buf)?;
    log::info!("generated {num} bytes with {}", pool.algorithm());

    Ok(match format {
        "hex" => hex::encode(&buf),
        _ => STANDARD.encode(&buf),
    })
}
