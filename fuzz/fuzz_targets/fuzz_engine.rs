#![no_main]
use std::sync::Arc;

use fipsrng_crypto::drbg::{DrbgEngine, Instantiate};
use fipsrng_crypto::registry::{AlgorithmDescriptor, Limits};
use fipsrng_types::DrbgAlgId;
use libfuzzer_sys::fuzz_target;

const LIMITS: Limits = Limits {
    max_nonce: 64,
    max_personalization: 64,
    max_additional: 64,
    max_entropy: 256,
    max_request: 512,
    max_reseed: 8,
};

fuzz_target!(|data: &[u8]| {
    let Some((&pick, mut ops)) = data.split_first() else {
        return;
    };
    let id = DrbgAlgId::ALL[pick as usize % DrbgAlgId::ALL.len()];
    let descriptor = Arc::new(AlgorithmDescriptor::new(id).with_limits(LIMITS));
    let Ok(mut engine) = DrbgEngine::for_known_answer(descriptor) else {
        return;
    };

    // Each op is a tag byte, a length byte and that many payload bytes.
    while ops.len() >= 2 {
        let tag = ops[0];
        let len = (ops[1] as usize).min(ops.len() - 2);
        let payload = &ops[2..2 + len];
        ops = &ops[2 + len..];

        let result = match tag % 6 {
            0 => {
                let (entropy, rest) = payload.split_at(payload.len() / 2);
                engine.instantiate(Instantiate {
                    entropy: Some(entropy),
                    nonce: Some(rest),
                    personalization: None,
                    strength: 0,
                    prediction_resistance: tag & 0x80 != 0,
                })
            }
            1 => {
                let (entropy, additional) = payload.split_at(payload.len() / 2);
                engine.reseed_with(entropy, additional)
            }
            2 => {
                let mut out = vec![0u8; len * 4];
                engine.generate(&mut out, payload)
            }
            3 => {
                let mut out = vec![0u8; len * 8];
                engine.generate_chunked(&mut out, payload)
            }
            4 => {
                engine.set_reseed_interval(len as u64);
                engine.force_reseed();
                Ok(())
            }
            _ => engine.cleanup(),
        };
        if let Err(e) = result {
            assert_eq!(e.state, engine.state());
        }
    }
});
