//! Describe one DRBG algorithm and the seed source it would use.

use fipsrng_crypto::drbg::{DrbgEngine, Instantiate};
use fipsrng_crypto::registry;
use fipsrng_types::default_noise_type;

pub fn run(alg: &str) -> Result<(), Box<dyn std::error::Error>> {
    for line in describe(alg)? {
        println!("{line}");
    }
    Ok(())
}

fn describe(alg: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let desc = registry::lookup(alg, false).ok_or_else(|| format!("unknown or unavailable algorithm: {alg}"))?;
    let limits = *desc.limits();

    let mut engine = DrbgEngine::with_default_source(desc.clone())?;
    engine.instantiate(Instantiate::default())?;
    let mut sample = [0u8; 32];
    engine.generate(&mut sample, &[])?;

    Ok(vec![
        format!("algorithm:           {}", desc.name()),
        format!("strengths:           {:?}", desc.strengths()),
        format!("seed length:         {}", desc.seed_len()),
        format!("output block:        {}", desc.out_len()),
        format!("max request:         {}", limits.max_request),
        format!("max reseed interval: {}", limits.max_reseed),
        format!("max nonce:           {}", limits.max_nonce),
        format!("max personalization: {}", limits.max_personalization),
        format!("max additional:      {}", limits.max_additional),
        format!("max entropy:         {}", limits.max_entropy),
        format!("noise type:          {}", default_noise_type()),
        format!("entropy estimate:    {}", engine.entropy_estimate()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cli_info() {
        let lines = describe("aes-256-ecb").unwrap();
        assert!(lines[0].ends_with("AES-256-ECB"));
        assert!(lines.iter().any(|l| l.contains("max request:") && l.ends_with("2048")));
    }

    #[test]
    #[serial]
    fn test_cli_info_unknown() {
        assert!(describe("MD5").is_err());
    }
}
