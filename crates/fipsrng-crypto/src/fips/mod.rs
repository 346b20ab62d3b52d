//! FIPS 140-3 self-test state machine.
//!
//! - **State machine**: PreOperational → SelfTesting → Operational / Error
//! - **DRBG KATs**: every registered algorithm's known-answer vectors
//! - **Entropy KATs**: fixed vectors for the block and nibble estimators
//!   and the SP 800-90B health tests, plus the staging-buffer order
//!
//! All functionality is gated behind `#[cfg(feature = "fips")]`.

mod selftest;

use fipsrng_types::CmvpError;
use log::{error, info};

/// FIPS module operational states (FIPS 140-3 §10.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FipsState {
    /// Initial state before self-tests have been run.
    PreOperational,
    /// Self-tests are currently executing.
    SelfTesting,
    /// All self-tests passed; module is ready for use.
    Operational,
    /// A self-test failed; module must not be used.
    Error,
}

/// Runs the power-up self-tests and tracks the outcome.
///
/// ```no_run
/// use fipsrng_crypto::fips::FipsModule;
///
/// let mut module = FipsModule::new();
/// module.run_self_tests().expect("FIPS self-tests failed");
/// assert!(module.is_operational());
/// ```
pub struct FipsModule {
    state: FipsState,
}

impl FipsModule {
    pub fn new() -> Self {
        FipsModule {
            state: FipsState::PreOperational,
        }
    }

    pub fn state(&self) -> FipsState {
        self.state
    }

    pub fn is_operational(&self) -> bool {
        self.state == FipsState::Operational
    }

    /// Run every self-test, stopping at the first failure.
    ///
    /// On failure the module enters `Error` and stays there.
    pub fn run_self_tests(&mut self) -> Result<(), CmvpError> {
        if self.state == FipsState::Error {
            return Err(CmvpError::InvalidState);
        }
        self.state = FipsState::SelfTesting;

        let outcome = selftest::drbg_known_answers()
            .and_then(|()| selftest::estimator_known_answers())
            .and_then(|()| selftest::health_known_answers())
            .and_then(|()| selftest::minibuffer_order());
        match outcome {
            Ok(()) => {
                self.state = FipsState::Operational;
                info!("fips: self-tests passed");
                Ok(())
            }
            Err(e) => {
                self.state = FipsState::Error;
                error!("fips: self-test failed: {e}");
                Err(e)
            }
        }
    }
}

impl Default for FipsModule {
    fn default() -> Self {
        Self::new()
    }
}
