//! Power-up self-tests beyond the per-algorithm DRBG vectors.
//!
//! The estimators gate every seed the module ever uses, so they get fixed
//! vectors of their own, as does the staging order of the noise buffer.

use crate::entropy::health::{block_estimate, nibble_estimate, AptTest, HealthTest, RctTest, ESTIMATE_BLOCK_LEN};
use crate::entropy::minibuf::{MiniBuffer, MINIBUF_SIZE};
use crate::registry;
use fipsrng_types::CmvpError;

/// Known-answer tests of every registered DRBG.
pub(crate) fn drbg_known_answers() -> Result<(), CmvpError> {
    for desc in registry::registry().descriptors() {
        desc.run_known_answers()?;
    }
    Ok(())
}

/// Block (byte) and nibble estimators against fixed inputs.
pub(crate) fn estimator_known_answers() -> Result<(), CmvpError> {
    let block_cases: [(fn(usize) -> u8, u32); 4] = [
        (|i| i as u8, 200),
        (|i| (i % 16) as u8, 100),
        (|i| (i % 8) as u8, 75),
        (|_| 0x5a, 0),
    ];
    for (n, &(gen, expected)) in block_cases.iter().enumerate() {
        let block: Vec<u8> = (0..ESTIMATE_BLOCK_LEN).map(gen).collect();
        let got = block_estimate(&block);
        if got != expected {
            return Err(CmvpError::KatFailure(format!(
                "block estimator case {n}: got {got}, expected {expected}"
            )));
        }
    }

    let spread: Vec<u8> = (0..32).map(|i| (i % 16) as u8 * 0x11).collect();
    let flat = [0u8; 32];
    for (n, (data, expected)) in [(&spread[..], 100), (&flat[..], 0)].iter().enumerate() {
        let got = nibble_estimate(data);
        if got != *expected {
            return Err(CmvpError::KatFailure(format!(
                "nibble estimator case {n}: got {got}, expected {expected}"
            )));
        }
    }
    Ok(())
}

/// Repetition-count and adaptive-proportion tests must trip on a stuck
/// source and pass a varying one.
pub(crate) fn health_known_answers() -> Result<(), CmvpError> {
    let mut rct = RctTest::new(5);
    if (0..10).all(|_| rct.test(0x42).is_ok()) {
        return Err(CmvpError::KatFailure("RCT missed a stuck source".into()));
    }

    let mut apt = AptTest::new(20, 15);
    if (0..20).all(|_| apt.test(0x42).is_ok()) {
        return Err(CmvpError::KatFailure("APT missed a biased source".into()));
    }

    let mut ht = HealthTest::with_defaults();
    for i in 0..1000u32 {
        ht.test_sample(i as u8)
            .map_err(|e| CmvpError::KatFailure(format!("health test rejected varying data: {e}")))?;
    }
    Ok(())
}

/// The staging buffer hands bytes out last-first and refills once empty.
pub(crate) fn minibuffer_order() -> Result<(), CmvpError> {
    let mut buf = MiniBuffer::new();
    let mut refills = 0u8;
    let mut seen = Vec::with_capacity(MINIBUF_SIZE + 1);
    for _ in 0..=MINIBUF_SIZE {
        let b = buf
            .get(|out| {
                refills += 1;
                for (i, x) in out.iter_mut().enumerate() {
                    *x = i as u8 ^ ((refills - 1) << 7);
                }
                Ok(())
            })
            .map_err(|e| CmvpError::KatFailure(format!("minibuffer refill: {e}")))?;
        seen.push(b);
    }
    let expected: Vec<u8> = (0..MINIBUF_SIZE as u8).rev().chain([0x80 | 63]).collect();
    if refills != 2 || seen != expected {
        return Err(CmvpError::KatFailure("minibuffer ordering".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimator_known_answers() {
        estimator_known_answers().unwrap();
    }

    #[test]
    fn test_health_known_answers() {
        health_known_answers().unwrap();
    }

    #[test]
    fn test_minibuffer_order() {
        minibuffer_order().unwrap();
    }
}
