//! The process-wide table of DRBG algorithms.
//!
//! Descriptors are immutable apart from their [`SelfTestCell`]. Lookup is
//! by case-insensitive name and honours the exclusion list and the sticky
//! self-test failure flag; the first lookup of an algorithm runs its
//! known-answer tests.

pub mod kat;
pub use kat::KatVector;

use crate::drbg::{ctr_drbg, hash_drbg, MechanismKind};
use crate::provider::Primitive;
use fipsrng_types::{CipherAlgId, DrbgAlgId, HashAlgId};
use log::{debug, error};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

/// Instantiations between repeated known-answer tests of one algorithm.
pub const SELF_TEST_AT: u32 = 1024;

/// Byte and call limits of one algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_nonce: usize,
    pub max_personalization: usize,
    pub max_additional: usize,
    pub max_entropy: usize,
    /// Largest single generate request.
    pub max_request: usize,
    /// Generate calls between reseeds.
    pub max_reseed: u64,
}

const INPUT_LIMIT: usize = 1 << 27;
const RESEED_LIMIT: u64 = 0x1000_0000;

impl Limits {
    const fn with_max_request(max_request: usize) -> Self {
        Limits {
            max_nonce: INPUT_LIMIT,
            max_personalization: INPUT_LIMIT,
            max_additional: INPUT_LIMIT,
            max_entropy: INPUT_LIMIT,
            max_request,
            max_reseed: RESEED_LIMIT,
        }
    }
}

#[derive(Debug, Default)]
struct CellState {
    countdown: u32,
    failed: bool,
}

/// Self-test schedule and sticky failure flag of one descriptor.
///
/// Shared by every instance of the algorithm; all access goes through the
/// methods below, each holding the cell's own lock.
#[derive(Debug, Default)]
pub struct SelfTestCell {
    inner: Mutex<CellState>,
}

impl SelfTestCell {
    fn with<R>(&self, f: impl FnOnce(&mut CellState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Count one instantiation. True when the known-answer tests are due.
    pub fn tick(&self) -> bool {
        self.with(|s| {
            if s.countdown <= 1 {
                s.countdown = 0;
                true
            } else {
                s.countdown -= 1;
                false
            }
        })
    }

    /// True when no test has passed since the last one was due.
    pub fn is_due(&self) -> bool {
        self.with(|s| s.countdown == 0)
    }

    /// Instantiations left until the next test.
    pub fn remaining(&self) -> u32 {
        self.with(|s| s.countdown)
    }

    pub fn record_pass(&self) {
        self.with(|s| s.countdown = SELF_TEST_AT);
    }

    /// Disable the algorithm for the rest of the process.
    pub fn mark_failed(&self) {
        self.with(|s| s.failed = true);
    }

    pub fn is_failed(&self) -> bool {
        self.with(|s| s.failed)
    }
}

/// Everything the engine needs to know about one DRBG algorithm.
#[derive(Debug)]
pub struct AlgorithmDescriptor {
    id: DrbgAlgId,
    kind: MechanismKind,
    primitive: Primitive,
    out_len: usize,
    seed_len: usize,
    limits: Limits,
    strengths: &'static [u32],
    fips_approved: bool,
    has_df: bool,
    kats: &'static [KatVector],
    self_test: SelfTestCell,
}

const BANDS_TO_192: &[u32] = &[112, 128, 192];
const BANDS_TO_256: &[u32] = &[112, 128, 192, 256];
const BAND_128: &[u32] = &[128];
const BAND_192: &[u32] = &[192];
const BAND_256: &[u32] = &[256];

impl AlgorithmDescriptor {
    /// A fresh, unregistered descriptor with its own self-test cell.
    pub fn new(id: DrbgAlgId) -> Self {
        use DrbgAlgId::*;
        let (kind, primitive, strengths, kats) = match id {
            HashSha224 => (MechanismKind::Hash, Primitive::Digest(HashAlgId::Sha224), BANDS_TO_192, kat::HASH_SHA224),
            HashSha256 => (MechanismKind::Hash, Primitive::Digest(HashAlgId::Sha256), BANDS_TO_256, kat::HASH_SHA256),
            HashSha384 => (MechanismKind::Hash, Primitive::Digest(HashAlgId::Sha384), BANDS_TO_256, kat::HASH_SHA384),
            HashSha512 => (MechanismKind::Hash, Primitive::Digest(HashAlgId::Sha512), BANDS_TO_256, kat::HASH_SHA512),
            CtrAes128 => (MechanismKind::Ctr, Primitive::Cipher(CipherAlgId::Aes128Ecb), BAND_128, kat::CTR_AES128),
            CtrAes192 => (MechanismKind::Ctr, Primitive::Cipher(CipherAlgId::Aes192Ecb), BAND_192, kat::CTR_AES192),
            CtrAes256 => (MechanismKind::Ctr, Primitive::Cipher(CipherAlgId::Aes256Ecb), BAND_256, kat::CTR_AES256),
            HmacSha224 => (MechanismKind::Hmac, Primitive::Digest(HashAlgId::Sha224), BANDS_TO_192, kat::HMAC_SHA224),
            HmacSha256 => (MechanismKind::Hmac, Primitive::Digest(HashAlgId::Sha256), BANDS_TO_256, kat::HMAC_SHA256),
            HmacSha384 => (MechanismKind::Hmac, Primitive::Digest(HashAlgId::Sha384), BANDS_TO_256, kat::HMAC_SHA384),
            HmacSha512 => (MechanismKind::Hmac, Primitive::Digest(HashAlgId::Sha512), BANDS_TO_256, kat::HMAC_SHA512),
        };

        let (seed_len, limits) = match primitive {
            Primitive::Digest(h) => {
                let seed_len = match kind {
                    MechanismKind::Hash => hash_drbg::seed_len(h),
                    _ => h.output_size(),
                };
                (seed_len, Limits::with_max_request(1 << 16))
            }
            Primitive::Cipher(c) => (ctr_drbg::seed_len(c), Limits::with_max_request(1 << 11)),
        };

        AlgorithmDescriptor {
            id,
            kind,
            primitive,
            out_len: primitive.output_len(),
            seed_len,
            limits,
            strengths,
            fips_approved: true,
            has_df: true,
            kats,
            self_test: SelfTestCell::default(),
        }
    }

    /// Replace the known-answer vectors.
    pub fn with_known_answers(mut self, kats: &'static [KatVector]) -> Self {
        self.kats = kats;
        self
    }

    /// Replace the byte and call limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn id(&self) -> DrbgAlgId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn kind(&self) -> MechanismKind {
        self.kind
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    /// Output block length in bytes.
    pub fn out_len(&self) -> usize {
        self.out_len
    }

    pub fn seed_len(&self) -> usize {
        self.seed_len
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Supported security strengths in bits, ascending.
    pub fn strengths(&self) -> &'static [u32] {
        self.strengths
    }

    pub fn max_strength(&self) -> u32 {
        self.strengths.last().copied().unwrap_or(0)
    }

    /// Resolve a requested strength: 0 picks the highest band, anything else
    /// the lowest band at least as strong. `None` if no band is strong enough.
    pub fn select_strength(&self, requested: u32) -> Option<u32> {
        if requested == 0 {
            return self.strengths.last().copied();
        }
        self.strengths.iter().copied().find(|&s| s >= requested)
    }

    pub fn is_fips_approved(&self) -> bool {
        self.fips_approved
    }

    pub fn has_df(&self) -> bool {
        self.has_df
    }

    pub fn known_answers(&self) -> &'static [KatVector] {
        self.kats
    }

    pub fn self_test(&self) -> &SelfTestCell {
        &self.self_test
    }

    /// Run the known-answer tests and record the outcome in the cell.
    pub fn run_known_answers(&self) -> Result<(), fipsrng_types::CmvpError> {
        match kat::run(self) {
            Ok(()) => {
                self.self_test.record_pass();
                debug!("registry: {} known-answer tests passed", self.name());
                Ok(())
            }
            Err(e) => {
                self.self_test.mark_failed();
                error!("registry: {} disabled: {e}", self.name());
                Err(e)
            }
        }
    }
}

/// The ordered set of registered descriptors.
pub struct Registry {
    descriptors: Vec<Arc<AlgorithmDescriptor>>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static EXCLUDE: RwLock<String> = RwLock::new(String::new());
static FIPS_NAMES: Mutex<Option<Vec<&'static str>>> = Mutex::new(None);

/// The process-wide registry.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry {
        descriptors: DrbgAlgId::ALL
            .iter()
            .map(|&id| Arc::new(AlgorithmDescriptor::new(id)))
            .collect(),
    })
}

impl Registry {
    pub fn descriptors(&self) -> &[Arc<AlgorithmDescriptor>] {
        &self.descriptors
    }

    /// Exact (case-insensitive) match, ignoring every filter.
    pub fn find(&self, name: &str) -> Option<&Arc<AlgorithmDescriptor>> {
        let name = name.trim();
        self.descriptors
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }
}

/// Replace the comma-delimited list of names never handed out.
pub fn set_exclude_list(list: &str) {
    *EXCLUDE.write().unwrap_or_else(PoisonError::into_inner) = list.to_string();
    *FIPS_NAMES.lock().unwrap_or_else(PoisonError::into_inner) = None;
}

pub fn exclude_list() -> String {
    EXCLUDE.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// True if `name` is a whole token of the exclusion list.
pub fn is_excluded(name: &str) -> bool {
    EXCLUDE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .split(',')
        .any(|tok| tok.trim().eq_ignore_ascii_case(name))
}

/// Look an algorithm up by name.
///
/// Excluded, non-approved (when `fips`) and self-test-failed algorithms are
/// never returned. The known-answer tests run first when they are due.
pub fn lookup(name: &str, fips: bool) -> Option<Arc<AlgorithmDescriptor>> {
    let desc = registry().find(name)?;
    if (fips && !desc.is_fips_approved()) || desc.self_test().is_failed() || is_excluded(desc.name()) {
        return None;
    }
    if desc.self_test().is_due() && desc.run_known_answers().is_err() {
        return None;
    }
    Some(Arc::clone(desc))
}

/// Names of the approved algorithms that are not excluded. Computed on
/// first use and again after the exclusion list changes.
pub fn fips_names() -> Vec<&'static str> {
    let mut cached = FIPS_NAMES.lock().unwrap_or_else(PoisonError::into_inner);
    cached
        .get_or_insert_with(|| {
            registry()
                .descriptors()
                .iter()
                .filter(|d| d.is_fips_approved() && !is_excluded(d.name()))
                .map(|d| d.name())
                .collect()
        })
        .clone()
}

/// Every registered name, in registry order.
pub fn names() -> Vec<&'static str> {
    registry().descriptors().iter().map(|d| d.name()).collect()
}
