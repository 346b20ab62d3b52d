#![doc = "FIPS SP 800-90A DRBG core and health-tested entropy pipeline for fipsrng."]

// Primitive provider
pub mod provider;
pub mod block;
pub mod hash;

// Seed sources
#[cfg(feature = "entropy")]
pub mod entropy;

// Random bit generation
#[cfg(feature = "drbg")]
pub mod config;
#[cfg(feature = "drbg")]
pub mod drbg;
#[cfg(feature = "drbg")]
pub mod registry;

// FIPS/CMVP compliance
#[cfg(feature = "fips")]
pub mod fips;
