use crate::state::DrbgState;

/// Primitive and entropy-pipeline errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    // General errors
    #[error("invalid algorithm id")]
    InvalidAlgId,
    #[error("invalid argument")]
    InvalidArg,
    #[error("operation not supported")]
    NotSupported,
    #[error("invalid key length: {0}")]
    InvalidKeyLength(usize),

    // Buffer errors
    #[error("buffer length not enough: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },
    #[error("input data too long")]
    InputOverflow,

    // DRBG errors
    #[error("drbg: invalid state")]
    DrbgInvalidState,
    #[error("drbg: failed to obtain entropy")]
    DrbgEntropyFail,

    // Entropy source errors
    #[error("entropy: repetition count test failed")]
    EntropyRctFailure,
    #[error("entropy: adaptive proportion test failed")]
    EntropyAptFailure,
    #[error("entropy: estimate below the acceptable minimum")]
    EntropyLowEstimate,
    #[error("entropy: long term entropy is below acceptable limits")]
    EntropyLongTermFailure,
    #[error("entropy: repeated duplicate seeds from the noise source")]
    EntropyDuplicateSeed,
    #[error("entropy: noise source unavailable: {0}")]
    NoiseSourceUnavailable(String),
}

/// Self-test (CMVP) errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CmvpError {
    #[error("known answer test failed: {0}")]
    KatFailure(String),
    #[error("module is in an invalid state for this operation")]
    InvalidState,
}

/// Failure returned by a DRBG engine operation.
///
/// `state` is the state the engine was left in; `reason` is a static,
/// non-localized description suitable for logs and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("drbg {state}: {reason}")]
pub struct DrbgError {
    pub state: DrbgState,
    pub reason: &'static str,
}

impl DrbgError {
    pub const fn new(state: DrbgState, reason: &'static str) -> Self {
        DrbgError { state, reason }
    }

    /// True for failures that disable the algorithm for the rest of the process.
    pub fn is_critical(&self) -> bool {
        self.state == DrbgState::Crit
    }
}

/// Static reason strings reported by the DRBG engine.
pub mod reason {
    pub const REQUESTED_STRENGTH: &str =
        "SP800-90 (DRBG) requested security strength is too high for the chosen algorithm";
    pub const BAD_STATE: &str = "The RNG was in an unexpected state";
    pub const NOT_INIT: &str = "The RNG is not initialized";
    pub const EXCESS_AAD: &str = "More than the allowed additional data was provided";
    pub const EXCESS_PERS: &str = "More than the allowed personalization data was provided";
    pub const EXCESS_ENT: &str = "Supplied data + internal entropy exceeds allowed input limits";
    pub const MIN_ENT: &str = "Less than the required minimum entropy was supplied";
    pub const EXCESS_NONCE: &str = "More than the allowed nonce data was supplied";
    pub const EXCESS_TOTAL: &str =
        "The total of entropy + nonce + personalization data was greater than permitted";
    pub const EXCESS_DATA: &str = "The data request was greater than allowed in this mode";
    pub const CONTINUOUS: &str = "The DRBG returned the same data twice";
    pub const NEEDS_RESEED: &str = "PRNG needed reseeding";
    pub const KAT_FAILED: &str = "Known answer test failed";
    pub const LOW_ENTROPY: &str = "TRNG failure, low entropy";
    pub const ZERO_ENTROPY_REQUEST: &str = "0 bytes is not a valid entropy request";
    pub const NO_USABLE_TRNG: &str = "TRNG change, no usable TRNG";
    pub const CLEANUP_FAILED: &str = "PRNG context cleanup failed";
    pub const ALGORITHM_DISABLED: &str = "Algorithm disabled after a failed self test";
    pub const PRIMITIVE_FAILED: &str = "The underlying primitive operation failed";
}
