//! End-to-end tests for fipsrng.
//! Registry, engine, pool and self-test module exercised together.

#[cfg(test)]
mod tests {
    use fipsrng_crypto::config::RngConfig;
    use fipsrng_crypto::drbg::{DrbgEngine, Instantiate, RngPool};
    use fipsrng_crypto::fips::FipsModule;
    use fipsrng_crypto::registry::{self, AlgorithmDescriptor};
    use fipsrng_types::{reason, DrbgAlgId, DrbgState};
    use serial_test::serial;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn hex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    // -------------------------------------------------------
    // 1. Self-tests, then every 256-bit algorithm through a pool
    // -------------------------------------------------------
    #[test]
    #[serial]
    fn test_selftest_then_pool_over_strong_algorithms() {
        let mut module = FipsModule::new();
        module.run_self_tests().unwrap();
        assert!(module.is_operational());

        let pool = RngPool::new(&RngConfig {
            instances: 2,
            ..RngConfig::default()
        })
        .unwrap();
        let mut seen = Vec::new();
        for name in registry::names() {
            let desc = registry::lookup(name, true).unwrap();
            if desc.max_strength() < 256 {
                assert!(pool.set_algorithm(name).is_err(), "{name}");
                continue;
            }
            pool.set_algorithm(name).unwrap();
            let mut out = vec![0u8; 3000];
            pool.fill(&mut out).unwrap();
            assert!(!seen.contains(&out), "{name} repeated output");
            seen.push(out);
        }
        // SHA256/384/512, AES-256, HMAC-SHA256/384/512
        assert_eq!(seen.len(), 7);
    }

    // -------------------------------------------------------
    // 2. Known-answer engines reproduce every registry vector
    // -------------------------------------------------------
    #[test]
    fn test_known_answer_engine_matches_registry_vectors() {
        for id in DrbgAlgId::ALL {
            let desc = Arc::new(AlgorithmDescriptor::new(id));
            for (n, v) in desc.known_answers().iter().enumerate() {
                let mut engine = DrbgEngine::for_known_answer(Arc::clone(&desc)).unwrap();
                let (entropy, nonce, pers) = (hex(v.entropy), hex(v.nonce), hex(v.personalization));
                engine
                    .instantiate(Instantiate {
                        entropy: Some(&entropy),
                        nonce: Some(&nonce),
                        personalization: Some(&pers),
                        ..Default::default()
                    })
                    .unwrap();
                if !v.reseed_entropy.is_empty() {
                    engine
                        .reseed_with(&hex(v.reseed_entropy), &hex(v.reseed_additional))
                        .unwrap();
                }
                let expected = hex(v.expected);
                let mut out = vec![0u8; expected.len()];
                for additional in v.additional {
                    engine.generate(&mut out, &hex(additional)).unwrap();
                }
                assert_eq!(out, expected, "{} #{n}", desc.name());
                engine.cleanup().unwrap();
                assert!(engine.is_zeroized());
            }
        }
    }

    // -------------------------------------------------------
    // 3. Explicit inputs make normal engines deterministic
    // -------------------------------------------------------
    #[test]
    fn test_explicit_seed_is_reproducible_across_engines() {
        let entropy = [0x3cu8; 48];
        let nonce = [0xa5u8; 24];
        let run = || {
            let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HmacSha512));
            let mut engine = DrbgEngine::with_default_source(desc).unwrap();
            engine
                .instantiate(Instantiate {
                    entropy: Some(&entropy),
                    nonce: Some(&nonce),
                    personalization: Some(b"interop"),
                    strength: 192,
                    ..Default::default()
                })
                .unwrap();
            assert_eq!(engine.strength(), 192);
            let mut out = [0u8; 96];
            engine.generate(&mut out, b"request one").unwrap();
            engine.generate(&mut out, &[]).unwrap();
            out
        };
        assert_eq!(run(), run());
    }

    // -------------------------------------------------------
    // 4. Configuration drives exclusion and pool construction
    // -------------------------------------------------------
    #[test]
    #[serial]
    fn test_config_exclusion_reaches_lookup_and_pool() {
        let env: HashMap<&str, &str> = [
            ("FIPSRNG_ALG", "HMAC-SHA256"),
            ("FIPSRNG_INSTANCES", "2"),
            ("FIPSRNG_EXCLUDE", "SHA256 , aes-128-ecb"),
        ]
        .into_iter()
        .collect();
        let cfg = RngConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        registry::set_exclude_list(&cfg.exclude);

        assert!(registry::lookup("SHA256", false).is_none());
        assert!(registry::lookup("AES-128-ECB", false).is_none());
        assert!(registry::lookup("SHA256x", false).is_none());
        assert!(!registry::fips_names().contains(&"SHA256"));
        assert!(registry::fips_names().contains(&"SHA384"));

        let pool = RngPool::new(&cfg).unwrap();
        assert_eq!(pool.instances(), 2);
        assert!(pool.set_algorithm("SHA256").is_err());
        let mut out = [0u8; 32];
        pool.fill(&mut out).unwrap();

        registry::set_exclude_list("");
        assert!(registry::lookup("SHA256", false).is_some());
        assert!(registry::fips_names().contains(&"SHA256"));
    }

    // -------------------------------------------------------
    // 5. Prediction resistance and forced reseeds over many calls
    // -------------------------------------------------------
    #[test]
    fn test_reseed_schedule_over_many_calls() {
        let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::CtrAes256));
        let mut engine = DrbgEngine::with_default_source(desc).unwrap();
        engine.instantiate(Instantiate::default()).unwrap();
        assert_eq!(engine.set_reseed_interval(5), 5);

        let mut out = [0u8; 40];
        for call in 1..=23u64 {
            engine.generate_chunked(&mut out, &[]).unwrap();
            let since = (call - 1) % 5 + 1;
            assert_eq!(engine.calls_remaining(), 5 - since, "call {call}");
        }
        engine.force_reseed();
        assert_eq!(engine.state(), DrbgState::Reseed);
        engine.generate(&mut out, &[]).unwrap();
        assert_eq!(engine.calls_remaining(), 4);

        assert_eq!(engine.cleanup(), Ok(()));
        let err = engine.generate(&mut out, &[]).unwrap_err();
        assert_eq!(err.reason, reason::NOT_INIT);
    }
}
