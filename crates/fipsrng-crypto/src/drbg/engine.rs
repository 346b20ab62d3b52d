//! The DRBG lifecycle state machine.
//!
//! One [`DrbgEngine`] wraps one mechanism instance. It owns the lifecycle
//! state, every length check against the algorithm descriptor, reseed
//! accounting, prediction resistance, the continuous output test and fork
//! detection. Mechanisms never see an input the descriptor does not allow.
//!
//! An engine is not internally synchronized; use one per thread or put it
//! behind a lock (see [`RngPool`](super::RngPool)).

use super::Mechanism;
use crate::entropy::conditioning::{DESIGN_ENTROPY, DRAIN_LEN};
use crate::entropy::{personalise, Trng};
use crate::registry::AlgorithmDescriptor;
use fipsrng_types::{default_noise_type, reason, CryptoError, DrbgError, DrbgState, NoiseType};
use log::{debug, error, warn};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

/// Bytes of each output compared by the continuous test.
pub const ANCHOR_LEN: usize = 8;

/// Largest entropy or nonce draw: 256-bit strength at the design entropy.
const MAX_DRAW: usize = 256 / 8 * DESIGN_ENTROPY as usize;

/// Inputs to [`DrbgEngine::instantiate`].
///
/// Omitted entropy and nonce are drawn from the engine's seed source;
/// omitted personalization is synthesized. A `strength` of 0 selects the
/// highest band the algorithm supports.
#[derive(Debug, Default, Clone, Copy)]
pub struct Instantiate<'a> {
    pub entropy: Option<&'a [u8]>,
    pub nonce: Option<&'a [u8]>,
    pub personalization: Option<&'a [u8]>,
    pub strength: u32,
    pub prediction_resistance: bool,
}

/// A DRBG instance bound to one algorithm and one seed source.
pub struct DrbgEngine {
    descriptor: Arc<AlgorithmDescriptor>,
    mechanism: Box<dyn Mechanism>,
    /// `None` only for known-answer engines.
    trng: Option<Trng>,
    state: DrbgState,
    last_error: Option<&'static str>,
    strength: u32,
    min_entropy: usize,
    reseed_interval: u64,
    calls: u64,
    prediction_resistance: bool,
    auto_chunk: bool,
    test_mode: bool,
    anchor: [u8; ANCHOR_LEN],
    anchored: bool,
    last_pid: u32,
}

impl DrbgEngine {
    /// An engine over `descriptor` seeded from `trng`.
    pub fn new(descriptor: Arc<AlgorithmDescriptor>, trng: Trng) -> Result<Self, CryptoError> {
        let mechanism = descriptor.kind().build(descriptor.primitive())?;
        Ok(Self::assemble(descriptor, mechanism, Some(trng)))
    }

    /// An engine seeded from the process-wide default noise type.
    pub fn with_default_source(descriptor: Arc<AlgorithmDescriptor>) -> Result<Self, CryptoError> {
        let trng = Trng::new(default_noise_type())?;
        Self::new(descriptor, trng)
    }

    /// An engine for replaying fixed vectors: no seed source, no continuous
    /// test, and every entropy input must come from the caller.
    pub fn for_known_answer(descriptor: Arc<AlgorithmDescriptor>) -> Result<Self, CryptoError> {
        let mechanism = descriptor.kind().build(descriptor.primitive())?;
        let mut engine = Self::assemble(descriptor, mechanism, None);
        engine.test_mode = true;
        Ok(engine)
    }

    fn assemble(
        descriptor: Arc<AlgorithmDescriptor>,
        mechanism: Box<dyn Mechanism>,
        trng: Option<Trng>,
    ) -> Self {
        DrbgEngine {
            descriptor,
            mechanism,
            trng,
            state: DrbgState::Uninit,
            last_error: None,
            strength: 0,
            min_entropy: 0,
            reseed_interval: 0,
            calls: 0,
            prediction_resistance: false,
            auto_chunk: true,
            test_mode: false,
            anchor: [0u8; ANCHOR_LEN],
            anchored: false,
            last_pid: std::process::id(),
        }
    }

    /// Record a failure and move to `state`.
    fn fail(&mut self, state: DrbgState, why: &'static str) -> DrbgError {
        self.state = state;
        self.last_error = Some(why);
        match state {
            DrbgState::Crit => {
                self.descriptor.self_test().mark_failed();
                error!("drbg {}: {why}; algorithm disabled", self.descriptor.name());
            }
            _ => warn!("drbg {} {state}: {why}", self.descriptor.name()),
        }
        DrbgError::new(state, why)
    }

    /// The error a failed instance keeps returning.
    fn frozen(&self) -> DrbgError {
        DrbgError::new(self.state, self.last_error.unwrap_or(reason::BAD_STATE))
    }

    /// Zero the working state, keeping the descriptor and seed source.
    fn scrub(&mut self) {
        self.mechanism.cleanup();
        self.anchor.zeroize();
        self.anchored = false;
        self.strength = 0;
        self.min_entropy = 0;
        self.reseed_interval = 0;
        self.calls = 0;
        self.prediction_resistance = false;
    }

    /// Entropy bytes drawn per seeding: enough that the minimum entropy holds
    /// at the source's design density.
    fn needed_bytes(&self) -> usize {
        let density = self.trng.as_ref().map_or(DESIGN_ENTROPY, |t| t.design_entropy());
        self.min_entropy * density as usize
    }

    fn draw(&mut self, out: &mut [u8]) -> Result<(), DrbgError> {
        if out.is_empty() {
            return Err(self.fail(DrbgState::Param, reason::ZERO_ENTROPY_REQUEST));
        }
        let drawn = match self.trng.as_mut() {
            Some(trng) => trng.generate_seed(out),
            None => Err(CryptoError::DrbgEntropyFail),
        };
        drawn.map_err(|e| {
            debug!("drbg: seed source failed: {e}");
            self.fail(DrbgState::Error, reason::LOW_ENTROPY)
        })
    }

    /// Instantiate (or re-instantiate) the generator.
    ///
    /// Allowed from any state but `Crit`. Every supplied length is checked
    /// before the mechanism is touched.
    pub fn instantiate(&mut self, req: Instantiate<'_>) -> Result<(), DrbgError> {
        if self.state == DrbgState::Crit {
            return Err(self.frozen());
        }
        if self.descriptor.self_test().is_failed() {
            return Err(self.fail(DrbgState::Crit, reason::ALGORITHM_DISABLED));
        }
        let limits = *self.descriptor.limits();
        let Some(strength) = self.descriptor.select_strength(req.strength) else {
            return Err(self.fail(DrbgState::Param, reason::REQUESTED_STRENGTH));
        };
        let min_entropy = strength as usize / 8;
        match req.entropy {
            Some(e) if e.len() < min_entropy => return Err(self.fail(DrbgState::Param, reason::MIN_ENT)),
            Some(e) if e.len() > limits.max_entropy => {
                return Err(self.fail(DrbgState::Param, reason::EXCESS_ENT));
            }
            None if self.test_mode => return Err(self.fail(DrbgState::Param, reason::MIN_ENT)),
            _ => {}
        }
        if req.nonce.map_or(0, <[u8]>::len) > limits.max_nonce {
            return Err(self.fail(DrbgState::Param, reason::EXCESS_NONCE));
        }
        if req.personalization.map_or(0, <[u8]>::len) > limits.max_personalization {
            return Err(self.fail(DrbgState::Param, reason::EXCESS_PERS));
        }

        // Validated; only now spend the KAT tick and the old state.
        if self.descriptor.self_test().tick() && self.descriptor.run_known_answers().is_err() {
            self.scrub();
            return Err(self.fail(DrbgState::Crit, reason::KAT_FAILED));
        }

        self.scrub();
        self.state = DrbgState::Uninit;
        self.last_error = None;
        self.strength = strength;
        self.min_entropy = min_entropy;
        self.prediction_resistance = req.prediction_resistance;

        let needed = self.needed_bytes();
        let mut entropy_buf = Zeroizing::new([0u8; MAX_DRAW]);
        let mut nonce_buf = Zeroizing::new([0u8; MAX_DRAW]);
        let mut pers_buf = Zeroizing::new([0u8; personalise::PERSONALIZATION_LEN]);

        let entropy: &[u8] = match req.entropy {
            Some(e) => e,
            None => {
                self.draw(&mut entropy_buf[..needed])?;
                &entropy_buf[..needed]
            }
        };

        let nonce: &[u8] = match req.nonce {
            Some(n) => n,
            None if self.test_mode => &[],
            None => {
                self.draw(&mut nonce_buf[..needed])?;
                &nonce_buf[..needed]
            }
        };

        let personalization: &[u8] = match req.personalization {
            Some(p) => p,
            None if self.test_mode => &[],
            None => {
                *pers_buf = personalise::personalization();
                let len = pers_buf.len().min(limits.max_personalization);
                &pers_buf[..len]
            }
        };

        if entropy.len() + nonce.len() + personalization.len() > limits.max_entropy {
            return Err(self.fail(DrbgState::Param, reason::EXCESS_TOTAL));
        }

        if let Err(e) = self.mechanism.instantiate(entropy, nonce, personalization) {
            debug!("drbg: instantiate primitive failed: {e}");
            return Err(self.fail(DrbgState::Crit, reason::PRIMITIVE_FAILED));
        }

        self.reseed_interval = limits.max_reseed;
        self.calls = 0;
        self.last_pid = std::process::id();
        self.state = if self.prediction_resistance {
            DrbgState::Reseed
        } else {
            DrbgState::Init
        };
        debug!(
            "drbg {}: instantiated at {} bits, prediction resistance {}",
            self.descriptor.name(),
            self.strength,
            self.prediction_resistance
        );
        Ok(())
    }

    fn check_additional(&mut self, additional: &[u8]) -> Result<(), DrbgError> {
        if additional.is_empty() {
            return Ok(());
        }
        let limits = *self.descriptor.limits();
        if additional.len() > limits.max_additional {
            return Err(self.fail(DrbgState::Param, reason::EXCESS_AAD));
        }
        if additional.len() + self.needed_bytes() > limits.max_entropy {
            return Err(self.fail(DrbgState::Param, reason::EXCESS_ENT));
        }
        Ok(())
    }

    /// Rebind to the process-wide default noise type if it changed.
    fn follow_default_source(&mut self) -> Result<(), DrbgError> {
        let wanted = default_noise_type();
        let current = self.trng.as_ref().map(Trng::noise_type);
        if current.is_none() || current == Some(wanted) {
            return Ok(());
        }
        match Trng::new(wanted) {
            Ok(trng) => {
                debug!("drbg: seed source changed to {wanted}");
                self.trng = Some(trng);
                Ok(())
            }
            Err(e) => {
                debug!("drbg: cannot bind {wanted}: {e}");
                self.trng = None;
                Err(self.fail(DrbgState::Crit, reason::NO_USABLE_TRNG))
            }
        }
    }

    fn ensure_reseedable(&mut self) -> Result<(), DrbgError> {
        match self.state {
            DrbgState::Init | DrbgState::Run | DrbgState::Reseed | DrbgState::Error => Ok(()),
            DrbgState::Param | DrbgState::Crit => Err(self.frozen()),
            DrbgState::Uninit => Err(self.fail(DrbgState::Error, reason::NOT_INIT)),
        }
    }

    /// Reseed from the seed source, mixing in `additional`.
    ///
    /// Also recovers an instance left in `Error` once the source is healthy.
    pub fn reseed(&mut self, additional: &[u8]) -> Result<(), DrbgError> {
        self.ensure_reseedable()?;
        if self.test_mode {
            return Err(self.fail(DrbgState::Param, reason::BAD_STATE));
        }
        self.check_additional(additional)?;
        self.follow_default_source()?;

        let needed = self.needed_bytes();
        let mut entropy = Zeroizing::new([0u8; MAX_DRAW]);
        self.draw(&mut entropy[..needed])?;
        self.reseed_mechanism(&entropy[..needed], additional)
    }

    /// Reseed with caller-supplied entropy. Known-answer engines only.
    pub fn reseed_with(&mut self, entropy: &[u8], additional: &[u8]) -> Result<(), DrbgError> {
        self.ensure_reseedable()?;
        if !self.test_mode {
            return Err(self.fail(DrbgState::Param, reason::BAD_STATE));
        }
        if entropy.len() < self.min_entropy {
            return Err(self.fail(DrbgState::Param, reason::MIN_ENT));
        }
        self.check_additional(additional)?;
        self.reseed_mechanism(entropy, additional)
    }

    fn reseed_mechanism(&mut self, entropy: &[u8], additional: &[u8]) -> Result<(), DrbgError> {
        if let Err(e) = self.mechanism.reseed(entropy, additional) {
            debug!("drbg: reseed primitive failed: {e}");
            return Err(self.fail(DrbgState::Crit, reason::PRIMITIVE_FAILED));
        }
        self.calls = 0;
        self.state = DrbgState::Run;
        self.last_error = None;
        debug!("drbg {}: reseeded", self.descriptor.name());
        Ok(())
    }

    /// Fill `out` with one request of at most the algorithm's request limit.
    ///
    /// With prediction resistance, or once the reseed interval was reached,
    /// the engine reseeds first and `additional` goes to that reseed.
    pub fn generate(&mut self, out: &mut [u8], additional: &[u8]) -> Result<(), DrbgError> {
        match self.state {
            DrbgState::Init | DrbgState::Run | DrbgState::Reseed => {}
            DrbgState::Uninit => return Err(self.fail(DrbgState::Error, reason::NOT_INIT)),
            _ => return Err(self.frozen()),
        }
        if out.len() > self.descriptor.limits().max_request {
            return Err(self.fail(DrbgState::Param, reason::EXCESS_DATA));
        }

        let mut additional = additional;
        if self.prediction_resistance || self.state == DrbgState::Reseed {
            if self.test_mode {
                return Err(self.fail(DrbgState::Error, reason::NEEDS_RESEED));
            }
            self.reseed(additional)?;
            additional = &[];
        }
        self.check_additional(additional)?;

        if !self.test_mode && !self.anchored {
            if let Err(e) = self.mechanism.generate(&mut self.anchor, &[]) {
                debug!("drbg: generate primitive failed: {e}");
                return Err(self.fail(DrbgState::Crit, reason::PRIMITIVE_FAILED));
            }
            self.anchored = true;
        }

        let mut prefix = Zeroizing::new([0u8; ANCHOR_LEN]);
        let short = !self.test_mode && out.len() < ANCHOR_LEN;
        let produced = if short {
            self.mechanism.generate(&mut prefix[..], additional)
        } else {
            self.mechanism.generate(out, additional)
        };
        if let Err(e) = produced {
            out.zeroize();
            debug!("drbg: generate primitive failed: {e}");
            return Err(self.fail(DrbgState::Crit, reason::PRIMITIVE_FAILED));
        }
        if short {
            let n = out.len();
            out.copy_from_slice(&prefix[..n]);
        } else if !self.test_mode {
            prefix.copy_from_slice(&out[..ANCHOR_LEN]);
        }

        if !self.test_mode {
            if repeats_anchor(&self.anchor, &prefix) {
                out.zeroize();
                return Err(self.fail(DrbgState::Crit, reason::CONTINUOUS));
            }
            self.anchor.copy_from_slice(&prefix[..]);
        }

        self.calls += 1;
        self.state = if self.calls >= self.reseed_interval {
            DrbgState::Reseed
        } else {
            DrbgState::Run
        };
        Ok(())
    }

    /// Fill `out` of any length.
    ///
    /// Splits the request into request-limit chunks (additional input goes
    /// with the first chunk only) and reseeds after a fork. If any chunk
    /// fails, all of `out` is wiped.
    pub fn generate_chunked(&mut self, out: &mut [u8], additional: &[u8]) -> Result<(), DrbgError> {
        self.detect_fork();
        if !self.auto_chunk {
            return self.generate(out, additional);
        }
        let chunk = self.descriptor.limits().max_request.max(1);
        let mut additional = additional;
        for i in (0..out.len()).step_by(chunk) {
            let end = (i + chunk).min(out.len());
            if let Err(e) = self.generate(&mut out[i..end], additional) {
                out.zeroize();
                return Err(e);
            }
            additional = &[];
        }
        if out.is_empty() {
            return self.generate(out, additional);
        }
        Ok(())
    }

    /// A different process id than at last use means this state was copied
    /// by a fork; throw away staged noise and force a reseed.
    ///
    /// Only as reliable as the platform's process ids. Environments that
    /// reuse or virtualize them can hide a fork from this check.
    fn detect_fork(&mut self) {
        let pid = std::process::id();
        if pid == self.last_pid {
            return;
        }
        self.last_pid = pid;
        if !self.state.can_generate() {
            return;
        }
        if let Some(trng) = self.trng.as_mut() {
            if let Err(e) = trng.drain() {
                warn!("drbg: draining {DRAIN_LEN} bytes after fork failed: {e}");
            }
        }
        debug!("drbg {}: process id changed, reseeding", self.descriptor.name());
        self.state = DrbgState::Reseed;
    }

    /// Zero all working state and return to `Uninit`.
    ///
    /// The descriptor and seed source stay bound. A mechanism that keeps
    /// state after cleanup is a `Crit` failure.
    pub fn cleanup(&mut self) -> Result<(), DrbgError> {
        let crit = self.state == DrbgState::Crit;
        self.scrub();
        if !self.mechanism.is_zeroized() {
            return Err(self.fail(DrbgState::Crit, reason::CLEANUP_FAILED));
        }
        if crit {
            return Err(self.frozen());
        }
        self.state = DrbgState::Uninit;
        self.last_error = None;
        Ok(())
    }

    /// True when no working state survives.
    pub fn is_zeroized(&self) -> bool {
        self.mechanism.is_zeroized()
            && self.anchor.iter().all(|&b| b == 0)
            && self.strength == 0
            && self.calls == 0
            && self.reseed_interval == 0
    }

    /// Run the algorithm's known-answer tests. Allowed only in `Init`;
    /// leaves the engine `Uninit`, or `Crit` with the algorithm disabled.
    pub fn self_test(&mut self) -> Result<(), DrbgError> {
        if self.state != DrbgState::Init {
            return Err(DrbgError::new(self.state, reason::BAD_STATE));
        }
        let outcome = self.descriptor.run_known_answers();
        self.scrub();
        if outcome.is_err() {
            return Err(self.fail(DrbgState::Crit, reason::KAT_FAILED));
        }
        self.state = DrbgState::Uninit;
        Ok(())
    }

    /// Draw conditioned entropy straight from the seed source.
    pub fn generate_seed(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        match self.trng.as_mut() {
            Some(trng) => trng.generate_seed(out),
            None => Err(CryptoError::NotSupported),
        }
    }

    /// Enable or disable prediction resistance. Only honoured in `Init`.
    pub fn set_prediction_resistance(&mut self, on: bool) -> bool {
        if self.state == DrbgState::Init {
            self.prediction_resistance = on;
        }
        self.prediction_resistance
    }

    /// Lower the reseed interval. Only honoured in `Init` and for
    /// `0 < calls < max_reseed`.
    pub fn set_reseed_interval(&mut self, calls: u64) -> u64 {
        if self.state == DrbgState::Init && calls > 0 && calls < self.descriptor.limits().max_reseed {
            self.reseed_interval = calls;
        }
        self.reseed_interval
    }

    /// Enable or disable request chunking. Only honoured in `Uninit` and
    /// `Init`; the setting survives re-instantiation.
    pub fn set_auto_chunking(&mut self, on: bool) -> bool {
        if matches!(self.state, DrbgState::Uninit | DrbgState::Init) {
            self.auto_chunk = on;
        }
        self.auto_chunk
    }

    /// Make the next generate reseed first.
    pub fn force_reseed(&mut self) -> DrbgState {
        if matches!(self.state, DrbgState::Init | DrbgState::Run) {
            self.state = DrbgState::Reseed;
        }
        self.state
    }

    pub fn state(&self) -> DrbgState {
        self.state
    }

    pub fn last_error(&self) -> Option<&'static str> {
        self.last_error
    }

    pub fn descriptor(&self) -> &Arc<AlgorithmDescriptor> {
        &self.descriptor
    }

    /// Security strength in bits, 0 before instantiation.
    pub fn strength(&self) -> u32 {
        self.strength
    }

    pub fn prediction_resistance(&self) -> bool {
        self.prediction_resistance
    }

    pub fn auto_chunking(&self) -> bool {
        self.auto_chunk
    }

    pub fn max_additional(&self) -> usize {
        self.descriptor.limits().max_additional
    }

    pub fn max_nonce(&self) -> usize {
        self.descriptor.limits().max_nonce
    }

    pub fn max_personalization(&self) -> usize {
        self.descriptor.limits().max_personalization
    }

    pub fn max_request(&self) -> usize {
        self.descriptor.limits().max_request
    }

    /// Minimum entropy input in bytes for the current strength.
    pub fn min_entropy(&self) -> usize {
        self.min_entropy
    }

    pub fn max_entropy(&self) -> usize {
        self.descriptor.limits().max_entropy
    }

    pub fn max_reseed(&self) -> u64 {
        self.descriptor.limits().max_reseed
    }

    pub fn reseed_interval(&self) -> u64 {
        self.reseed_interval
    }

    /// Generate calls left before a reseed is forced.
    pub fn calls_remaining(&self) -> u64 {
        self.reseed_interval.saturating_sub(self.calls)
    }

    /// 0–100 estimate of the seed source; 0 without one.
    pub fn entropy_estimate(&self) -> u32 {
        self.trng.as_ref().map_or(0, Trng::estimate)
    }

    pub fn noise_type(&self) -> Option<NoiseType> {
        self.trng.as_ref().map(Trng::noise_type)
    }
}

impl Drop for DrbgEngine {
    fn drop(&mut self) {
        self.scrub();
    }
}

/// Continuous test: only the first [`ANCHOR_LEN`] bytes are compared.
fn repeats_anchor(anchor: &[u8; ANCHOR_LEN], prefix: &[u8; ANCHOR_LEN]) -> bool {
    bool::from(anchor.ct_eq(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::test_sources::PatternNoise;
    use crate::entropy::EntropyConfig;
    use crate::registry::{KatVector, Limits};
    use fipsrng_types::DrbgAlgId;
    use proptest::prelude::*;

    fn hex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    const SCENARIO_ENTROPY: &str = "acd4d2ed56726b5234b006f9e592c6927f4c6b97290c0abbf9050d960abd6c90";
    const SCENARIO_NONCE: &str = "58c7ba7f78cc562bb318ddc2003f42ac";
    const SCENARIO_PERS: &[u8] = b"fipsrng engine scenario";

    fn pattern_trng() -> Trng {
        Trng::with_source(Box::new(PatternNoise::spread(256)), EntropyConfig::default()).unwrap()
    }

    fn engine(id: DrbgAlgId) -> DrbgEngine {
        DrbgEngine::new(Arc::new(AlgorithmDescriptor::new(id)), pattern_trng()).unwrap()
    }

    fn scenario(e: &mut DrbgEngine) {
        let entropy = hex(SCENARIO_ENTROPY);
        let nonce = hex(SCENARIO_NONCE);
        e.instantiate(Instantiate {
            entropy: Some(&entropy),
            nonce: Some(&nonce),
            personalization: Some(SCENARIO_PERS),
            strength: 256,
            prediction_resistance: false,
        })
        .unwrap();
    }

    /// Emits the same bytes forever.
    struct StuckMechanism;

    impl Mechanism for StuckMechanism {
        fn seed_len(&self) -> usize {
            32
        }
        fn instantiate(&mut self, _: &[u8], _: &[u8], _: &[u8]) -> Result<(), CryptoError> {
            Ok(())
        }
        fn reseed(&mut self, _: &[u8], _: &[u8]) -> Result<(), CryptoError> {
            Ok(())
        }
        fn generate(&mut self, out: &mut [u8], _: &[u8]) -> Result<(), CryptoError> {
            out.fill(0xA5);
            Ok(())
        }
        fn cleanup(&mut self) {}
        fn is_zeroized(&self) -> bool {
            true
        }
    }

    /// Counts up once per call until `stall_at`, then repeats itself.
    struct StallingMechanism {
        calls: u8,
        stall_at: u8,
    }

    impl Mechanism for StallingMechanism {
        fn seed_len(&self) -> usize {
            32
        }
        fn instantiate(&mut self, _: &[u8], _: &[u8], _: &[u8]) -> Result<(), CryptoError> {
            Ok(())
        }
        fn reseed(&mut self, _: &[u8], _: &[u8]) -> Result<(), CryptoError> {
            Ok(())
        }
        fn generate(&mut self, out: &mut [u8], _: &[u8]) -> Result<(), CryptoError> {
            if self.calls < self.stall_at {
                self.calls += 1;
            }
            out.fill(self.calls);
            Ok(())
        }
        fn cleanup(&mut self) {
            self.calls = 0;
        }
        fn is_zeroized(&self) -> bool {
            self.calls == 0
        }
    }

    #[test]
    fn test_ctr_aes256_scenario() {
        let mut e = engine(DrbgAlgId::CtrAes256);
        scenario(&mut e);
        assert_eq!(e.state(), DrbgState::Init);
        assert_eq!(e.strength(), 256);
        assert_eq!(e.min_entropy(), 32);

        let mut out = [0u8; 64];
        e.generate(&mut out, &[]).unwrap();
        // The first call spends one anchor block before the output.
        assert_eq!(
            out.to_vec(),
            hex("d39ae2132b7deb217419661c35a8ab7a173dcb905405c2fd76cb0d70229e16db\
                 c973eb2f3e5c940047adefad995305384264443a70c5654e527d57f34a3ec3c3")
        );
        assert_eq!(e.state(), DrbgState::Run);
        assert_eq!(e.anchor[..], out[..ANCHOR_LEN]);
    }

    #[test]
    fn test_known_answer_engine_has_no_anchor() {
        let mut e = DrbgEngine::for_known_answer(Arc::new(AlgorithmDescriptor::new(DrbgAlgId::CtrAes256))).unwrap();
        scenario(&mut e);
        let mut out = [0u8; 64];
        e.generate(&mut out, &[]).unwrap();
        assert_eq!(&out[..ANCHOR_LEN], &hex("95b4f92c4c933346")[..]);
        assert_eq!(e.anchor, [0u8; ANCHOR_LEN]);
        assert_eq!(e.entropy_estimate(), 0);
    }

    #[test]
    fn test_known_answer_engine_requires_entropy() {
        let mut e = DrbgEngine::for_known_answer(Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HashSha256))).unwrap();
        let err = e.instantiate(Instantiate::default()).unwrap_err();
        assert_eq!(err, DrbgError::new(DrbgState::Param, reason::MIN_ENT));
    }

    #[test]
    fn test_known_answer_engine_replays_reseed_vector() {
        let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::CtrAes192));
        let mut e = DrbgEngine::for_known_answer(desc).unwrap();
        let entropy = hex("49036024ee3ead55dab0789d8d809adacb10820c501c8093");
        let nonce = hex("ffce8b0dc00a0e37e41f2d6dd13b6b56");
        e.instantiate(Instantiate {
            entropy: Some(&entropy),
            nonce: Some(&nonce),
            ..Default::default()
        })
        .unwrap();
        e.reseed_with(&hex("d35405984090cab12fcabaaeba4b4e36b91869782ed86327"), &[])
            .unwrap();
        let mut out = [0u8; 8];
        e.generate(&mut out, &[]).unwrap();
        assert_eq!(out.to_vec(), hex("7a57cdc313383aa2"));
        assert!(e.reseed(&[]).is_err());
    }

    #[test]
    fn test_corrupted_anchor_is_critical() {
        let mut twin = engine(DrbgAlgId::CtrAes256);
        scenario(&mut twin);
        let mut out = [0u8; 64];
        twin.generate(&mut out, &[]).unwrap();
        twin.generate(&mut out, &[]).unwrap();
        let next_prefix: [u8; ANCHOR_LEN] = out[..ANCHOR_LEN].try_into().unwrap();

        let mut e = engine(DrbgAlgId::CtrAes256);
        scenario(&mut e);
        e.generate(&mut out, &[]).unwrap();
        // Overwrite the stored anchor with what the next call will produce.
        e.anchor = next_prefix;
        let err = e.generate(&mut out, &[]).unwrap_err();
        assert_eq!(err, DrbgError::new(DrbgState::Crit, reason::CONTINUOUS));
        assert!(err.is_critical());
        assert_eq!(out, [0u8; 64]);
        assert_eq!(e.state(), DrbgState::Crit);
        assert!(e.descriptor().self_test().is_failed());

        // Crit is absorbing.
        assert_eq!(e.reseed(&[]).unwrap_err().state, DrbgState::Crit);
        assert_eq!(e.instantiate(Instantiate::default()).unwrap_err().state, DrbgState::Crit);
        assert_eq!(e.generate(&mut out, &[]).unwrap_err().state, DrbgState::Crit);
    }

    #[test]
    fn test_stuck_mechanism_is_critical_and_sticky() {
        let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HashSha256));
        let mut e = DrbgEngine::assemble(Arc::clone(&desc), Box::new(StuckMechanism), Some(pattern_trng()));
        e.instantiate(Instantiate::default()).unwrap();
        let mut out = [0u8; 32];
        let err = e.generate(&mut out, &[]).unwrap_err();
        assert_eq!(err.reason, reason::CONTINUOUS);
        assert!(desc.self_test().is_failed());

        // A brand-new instance of the same algorithm is refused.
        let mut fresh = DrbgEngine::new(Arc::clone(&desc), pattern_trng()).unwrap();
        let err = fresh.instantiate(Instantiate::default()).unwrap_err();
        assert_eq!(err, DrbgError::new(DrbgState::Crit, reason::ALGORITHM_DISABLED));
    }

    #[test]
    fn test_short_requests_still_run_the_continuous_test() {
        let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HmacSha256));
        let mut e = DrbgEngine::assemble(desc, Box::new(StuckMechanism), Some(pattern_trng()));
        e.instantiate(Instantiate::default()).unwrap();
        let mut out = [0u8; 3];
        assert_eq!(e.generate(&mut out, &[]).unwrap_err().state, DrbgState::Crit);
    }

    #[test]
    fn test_reseed_interval() {
        let mut e = engine(DrbgAlgId::HashSha256);
        e.instantiate(Instantiate::default()).unwrap();
        assert_eq!(e.reseed_interval(), 0x1000_0000);
        assert_eq!(e.set_reseed_interval(3), 3);
        let mut out = [0u8; 16];

        e.generate(&mut out, &[]).unwrap();
        e.generate(&mut out, &[]).unwrap();
        assert_eq!(e.state(), DrbgState::Run);
        assert_eq!(e.calls_remaining(), 1);

        // The call reaching the interval succeeds and flags the next one.
        e.generate(&mut out, &[]).unwrap();
        assert_eq!(e.state(), DrbgState::Reseed);
        assert_eq!(e.calls_remaining(), 0);

        e.generate(&mut out, &[]).unwrap();
        assert_eq!(e.state(), DrbgState::Run);
        assert_eq!(e.calls_remaining(), 2);

        // Only honoured in Init.
        assert_eq!(e.set_reseed_interval(10), 3);
    }

    #[test]
    fn test_oversized_request_is_param_without_side_effects() {
        let mut e = engine(DrbgAlgId::CtrAes128);
        e.instantiate(Instantiate::default()).unwrap();
        let mut out = vec![0u8; 64];
        e.generate(&mut out, &[]).unwrap();
        let anchor = e.anchor;
        let remaining = e.calls_remaining();

        let mut big = vec![0u8; e.max_request() + 1];
        let err = e.generate(&mut big, &[]).unwrap_err();
        assert_eq!(err, DrbgError::new(DrbgState::Param, reason::EXCESS_DATA));
        assert!(big.iter().all(|&b| b == 0));
        assert_eq!(e.anchor, anchor);
        assert_eq!(e.calls_remaining(), remaining);
        assert_eq!(e.last_error(), Some(reason::EXCESS_DATA));

        // Param sticks until the next instantiate.
        assert_eq!(e.generate(&mut out, &[]).unwrap_err().state, DrbgState::Param);
        e.instantiate(Instantiate::default()).unwrap();
        e.generate(&mut out, &[]).unwrap();
    }

    #[test]
    fn test_instantiate_then_cleanup_is_zero() {
        for id in DrbgAlgId::ALL {
            let mut e = engine(id);
            e.instantiate(Instantiate::default()).unwrap();
            assert!(!e.is_zeroized());
            e.cleanup().unwrap();
            assert!(e.is_zeroized(), "{id:?}");
            assert_eq!(e.state(), DrbgState::Uninit);
        }
    }

    #[test]
    fn test_instantiate_parameter_checks() {
        let mut e = engine(DrbgAlgId::HashSha224);
        let err = e
            .instantiate(Instantiate {
                strength: 256,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.reason, reason::REQUESTED_STRENGTH);

        let err = e
            .instantiate(Instantiate {
                entropy: Some(&[0x11; 15]),
                strength: 128,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, DrbgError::new(DrbgState::Param, reason::MIN_ENT));

        e.instantiate(Instantiate {
            entropy: Some(&[0x11; 16]),
            strength: 128,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(e.strength(), 128);
    }

    #[test]
    fn test_limits_are_checked_before_the_mechanism() {
        let limits = Limits {
            max_nonce: 8,
            max_personalization: 8,
            max_additional: 8,
            max_entropy: 256,
            max_request: 32,
            max_reseed: 100,
        };
        let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HmacSha256).with_limits(limits));
        let mut e = DrbgEngine::new(desc, pattern_trng()).unwrap();

        let err = e
            .instantiate(Instantiate {
                personalization: Some(&[0u8; 9]),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.reason, reason::EXCESS_PERS);
        assert!(e.is_zeroized());

        let err = e
            .instantiate(Instantiate {
                nonce: Some(&[0u8; 9]),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.reason, reason::EXCESS_NONCE);

        let err = e
            .instantiate(Instantiate {
                entropy: Some(&[0u8; 250]),
                nonce: Some(&[0u8; 8]),
                personalization: Some(&[]),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.reason, reason::EXCESS_TOTAL);
        assert_eq!(e.state(), DrbgState::Param);

        e.instantiate(Instantiate::default()).unwrap();
        let mut out = [0u8; 16];
        let err = e.generate(&mut out, &[0u8; 9]).unwrap_err();
        assert_eq!(err.reason, reason::EXCESS_AAD);
    }

    #[test]
    fn test_prediction_resistance_reseeds_every_call() {
        let mut e = engine(DrbgAlgId::HmacSha384);
        e.instantiate(Instantiate {
            prediction_resistance: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(e.state(), DrbgState::Reseed);
        assert!(e.prediction_resistance());
        let mut out = [0u8; 48];
        for _ in 0..3 {
            e.generate(&mut out, b"consumed by the reseed").unwrap();
            assert_eq!(e.state(), DrbgState::Run);
            assert_eq!(e.calls_remaining(), e.reseed_interval() - 1);
        }
    }

    #[test]
    fn test_controls_only_in_init() {
        let mut e = engine(DrbgAlgId::HashSha512);
        e.instantiate(Instantiate::default()).unwrap();
        assert!(e.set_prediction_resistance(true));
        assert!(!e.set_prediction_resistance(false));
        assert!(!e.set_auto_chunking(false));
        assert_eq!(e.force_reseed(), DrbgState::Reseed);
        assert!(!e.set_prediction_resistance(true));
        let mut out = [0u8; 8];
        e.generate(&mut out, &[]).unwrap();
        assert_eq!(e.state(), DrbgState::Run);
    }

    #[test]
    fn test_generate_before_instantiate() {
        let mut e = engine(DrbgAlgId::HashSha256);
        let err = e.generate(&mut [0u8; 8], &[]).unwrap_err();
        assert_eq!(err, DrbgError::new(DrbgState::Error, reason::NOT_INIT));
        // Error allows instantiate to start over.
        e.instantiate(Instantiate::default()).unwrap();
    }

    #[test]
    fn test_error_recovers_through_reseed() {
        let mut e = engine(DrbgAlgId::HashSha256);
        e.instantiate(Instantiate::default()).unwrap();
        e.state = DrbgState::Error;
        e.last_error = Some(reason::LOW_ENTROPY);
        assert_eq!(e.generate(&mut [0u8; 8], &[]).unwrap_err().reason, reason::LOW_ENTROPY);
        e.reseed(&[]).unwrap();
        assert_eq!(e.state(), DrbgState::Run);
        e.generate(&mut [0u8; 8], &[]).unwrap();
    }

    #[test]
    fn test_self_test_control() {
        let mut e = engine(DrbgAlgId::CtrAes192);
        e.instantiate(Instantiate::default()).unwrap();
        e.self_test().unwrap();
        assert_eq!(e.state(), DrbgState::Uninit);
        assert!(e.is_zeroized());

        e.instantiate(Instantiate::default()).unwrap();
        e.generate(&mut [0u8; 16], &[]).unwrap();
        assert_eq!(e.self_test().unwrap_err(), DrbgError::new(DrbgState::Run, reason::BAD_STATE));
        assert_eq!(e.state(), DrbgState::Run);
    }

    #[test]
    fn test_failed_known_answer_disables_algorithm() {
        static BROKEN: [KatVector; 1] = [KatVector {
            entropy: "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff",
            nonce: "",
            personalization: "",
            reseed_entropy: "",
            reseed_additional: "",
            additional: &[""],
            expected: "0000000000000000",
        }];
        let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HashSha256).with_known_answers(&BROKEN));
        let mut e = DrbgEngine::new(Arc::clone(&desc), pattern_trng()).unwrap();
        let err = e.instantiate(Instantiate::default()).unwrap_err();
        assert_eq!(err, DrbgError::new(DrbgState::Crit, reason::KAT_FAILED));
        assert!(desc.self_test().is_failed());
    }

    #[test]
    fn test_known_answers_rerun_on_schedule() {
        let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HmacSha224));
        let mut e = DrbgEngine::new(Arc::clone(&desc), pattern_trng()).unwrap();
        e.instantiate(Instantiate::default()).unwrap();
        assert_eq!(desc.self_test().remaining(), crate::registry::SELF_TEST_AT);
        e.instantiate(Instantiate::default()).unwrap();
        assert_eq!(desc.self_test().remaining(), crate::registry::SELF_TEST_AT - 1);
    }

    #[test]
    fn test_chunked_matches_manual_chunks() {
        let mut a = DrbgEngine::for_known_answer(Arc::new(AlgorithmDescriptor::new(DrbgAlgId::CtrAes128))).unwrap();
        let mut b = DrbgEngine::for_known_answer(Arc::new(AlgorithmDescriptor::new(DrbgAlgId::CtrAes128))).unwrap();
        for e in [&mut a, &mut b] {
            e.instantiate(Instantiate {
                entropy: Some(&[0x42; 16]),
                nonce: Some(&[0x24; 8]),
                ..Default::default()
            })
            .unwrap();
        }
        assert_eq!(a.max_request(), 2048);

        let mut whole = vec![0u8; 5000];
        a.generate_chunked(&mut whole, b"aad").unwrap();

        let mut parts = vec![0u8; 5000];
        let (first, rest) = parts.split_at_mut(2048);
        let (second, third) = rest.split_at_mut(2048);
        b.generate(first, b"aad").unwrap();
        b.generate(second, &[]).unwrap();
        b.generate(third, &[]).unwrap();
        assert_eq!(whole, parts);
    }

    #[test]
    fn test_chunking_disabled_enforces_request_limit() {
        let mut e = engine(DrbgAlgId::CtrAes256);
        e.instantiate(Instantiate::default()).unwrap();
        assert!(!e.set_auto_chunking(false));
        let mut out = vec![0u8; 4096];
        assert_eq!(e.generate_chunked(&mut out, &[]).unwrap_err().reason, reason::EXCESS_DATA);
    }

    #[test]
    fn test_fork_forces_reseed() {
        let mut e = engine(DrbgAlgId::HashSha384);
        e.instantiate(Instantiate::default()).unwrap();
        let mut out = [0u8; 32];
        e.generate_chunked(&mut out, &[]).unwrap();
        e.generate_chunked(&mut out, &[]).unwrap();
        assert_eq!(e.calls_remaining(), e.reseed_interval() - 2);

        e.last_pid = e.last_pid.wrapping_add(1);
        e.generate_chunked(&mut out, &[]).unwrap();
        assert_eq!(e.last_pid, std::process::id());
        assert_eq!(e.calls_remaining(), e.reseed_interval() - 1);
    }

    #[test]
    fn test_fork_with_os_source_keeps_serving() {
        let trng = Trng::new(NoiseType::Os).unwrap();
        let mut e = DrbgEngine::new(Arc::new(AlgorithmDescriptor::new(DrbgAlgId::CtrAes256)), trng).unwrap();
        e.instantiate(Instantiate::default()).unwrap();
        let mut out = [0u8; 64];
        e.generate_chunked(&mut out, &[]).unwrap();

        e.last_pid = e.last_pid.wrapping_add(1);
        e.generate_chunked(&mut out, &[]).unwrap();
        assert_eq!(e.state(), DrbgState::Run);
        assert_eq!(e.calls_remaining(), e.reseed_interval() - 1);

        // A second drain and an explicit reseed still find entropy.
        e.last_pid = e.last_pid.wrapping_add(1);
        e.generate_chunked(&mut out, &[]).unwrap();
        e.reseed(&[]).unwrap();
        e.generate_chunked(&mut out, &[]).unwrap();
    }

    #[test]
    fn test_chunked_failure_wipes_whole_output() {
        let limits = Limits {
            max_nonce: 1 << 10,
            max_personalization: 1 << 10,
            max_additional: 1 << 10,
            max_entropy: 1 << 10,
            max_request: 32,
            max_reseed: 100,
        };
        let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HashSha256).with_limits(limits));
        let mech = Box::new(StallingMechanism { calls: 0, stall_at: 3 });
        let mut e = DrbgEngine::assemble(Arc::clone(&desc), mech, Some(pattern_trng()));
        e.instantiate(Instantiate::default()).unwrap();

        // Anchor, then two good chunks, then a repeat on the third chunk.
        let mut out = [0u8; 96];
        let err = e.generate_chunked(&mut out, &[]).unwrap_err();
        assert_eq!(err, DrbgError::new(DrbgState::Crit, reason::CONTINUOUS));
        assert!(out.iter().all(|&b| b == 0));
        assert!(desc.self_test().is_failed());
    }

    #[test]
    fn test_rejected_instantiate_keeps_working_state() {
        let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HashSha256));
        let mut e = DrbgEngine::new(Arc::clone(&desc), pattern_trng()).unwrap();
        e.instantiate(Instantiate::default()).unwrap();
        e.generate(&mut [0u8; 16], &[]).unwrap();
        let remaining = desc.self_test().remaining();
        let anchor = e.anchor;

        let err = e
            .instantiate(Instantiate {
                entropy: Some(&[0x5a; 4]),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, DrbgError::new(DrbgState::Param, reason::MIN_ENT));
        assert_eq!(desc.self_test().remaining(), remaining);
        assert_eq!(e.anchor, anchor);
        assert_eq!(e.strength(), 256);
        assert!(!e.is_zeroized());

        let err = e
            .instantiate(Instantiate {
                strength: 512,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.reason, reason::REQUESTED_STRENGTH);
        assert_eq!(desc.self_test().remaining(), remaining);

        e.instantiate(Instantiate::default()).unwrap();
        assert_eq!(desc.self_test().remaining(), remaining - 1);
    }

    #[test]
    fn test_reseed_follows_default_noise_type() {
        let trng = Trng::with_source(
            Box::new(PatternNoise::spread(256).with_type(NoiseType::Hw)),
            EntropyConfig::default(),
        )
        .unwrap();
        let mut e = DrbgEngine::new(Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HashSha256)), trng).unwrap();
        e.instantiate(Instantiate::default()).unwrap();
        assert_eq!(e.noise_type(), Some(NoiseType::Hw));
        e.reseed(b"rebind").unwrap();
        assert_eq!(e.noise_type(), Some(default_noise_type()));
    }

    #[test]
    fn test_generate_seed_draws_from_source() {
        let mut e = engine(DrbgAlgId::HashSha256);
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        e.generate_seed(&mut a).unwrap();
        e.generate_seed(&mut b).unwrap();
        assert_ne!(a, b);
        assert_eq!(e.entropy_estimate(), 100);
    }

    proptest! {
        #[test]
        fn prop_prefix_match_always_detected(prefix in any::<[u8; ANCHOR_LEN]>()) {
            prop_assert!(repeats_anchor(&prefix, &prefix));
        }

        // Outputs that differ only past the prefix are not caught; outputs
        // whose prefixes differ anywhere never trip the test.
        #[test]
        fn prop_prefix_difference_never_flagged(
            anchor in any::<[u8; ANCHOR_LEN]>(),
            index in 0..ANCHOR_LEN,
            flip in 1u8..=255,
        ) {
            let mut prefix = anchor;
            prefix[index] ^= flip;
            prop_assert!(!repeats_anchor(&anchor, &prefix));
        }

        #[test]
        fn prop_fresh_outputs_pass(seed in any::<[u8; 32]>(), n in 1usize..6) {
            let desc = Arc::new(AlgorithmDescriptor::new(DrbgAlgId::HmacSha256));
            let mut e = DrbgEngine::new(desc, pattern_trng()).unwrap();
            e.instantiate(Instantiate { entropy: Some(&seed), ..Default::default() }).unwrap();
            let mut out = [0u8; 16];
            for _ in 0..n {
                prop_assert!(e.generate(&mut out, &[]).is_ok());
            }
        }
    }
}
