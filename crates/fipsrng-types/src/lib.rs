#![forbid(unsafe_code)]
#![doc = "Common types, error codes, state and algorithm identifiers for fipsrng."]

pub mod algorithm;
pub mod error;
pub mod state;

pub use algorithm::*;
pub use error::*;
pub use state::*;
