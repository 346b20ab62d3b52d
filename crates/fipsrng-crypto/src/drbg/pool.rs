//! A fixed set of independently locked DRBG lanes.
//!
//! Callers are spread over the lanes by a hash of their thread id, so
//! threads rarely contend. Lanes are created on first use; a lane that
//! fails with a recoverable error is rebuilt once before the error is
//! returned.

use super::{DrbgEngine, Instantiate};
use crate::config::{clamp_instances, RngConfig};
use crate::entropy::personalise::thread_tag;
use crate::registry::{self, AlgorithmDescriptor};
use fipsrng_types::{reason, CryptoError, DrbgError, DrbgState};
use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// What a new lane is instantiated with.
#[derive(Clone)]
struct LaneSpec {
    descriptor: Arc<AlgorithmDescriptor>,
    strength: u32,
    prediction_resistance: bool,
    auto_chunking: bool,
}

/// Thread-spread pool of DRBG instances.
pub struct RngPool {
    spec: RwLock<LaneSpec>,
    lanes: Vec<Mutex<Option<DrbgEngine>>>,
}

impl RngPool {
    /// Build a pool from `cfg`. Lanes are seeded from the process-wide
    /// default noise type.
    pub fn new(cfg: &RngConfig) -> Result<Self, CryptoError> {
        let descriptor = registry::lookup(&cfg.algorithm, false).ok_or(CryptoError::InvalidAlgId)?;
        if descriptor.select_strength(cfg.strength).is_none() {
            return Err(CryptoError::InvalidArg);
        }
        let lanes = (0..clamp_instances(cfg.instances)).map(|_| Mutex::new(None)).collect();
        Ok(RngPool {
            spec: RwLock::new(LaneSpec {
                descriptor,
                strength: cfg.strength,
                prediction_resistance: cfg.prediction_resistance,
                auto_chunking: cfg.auto_chunking,
            }),
            lanes,
        })
    }

    pub fn instances(&self) -> usize {
        self.lanes.len()
    }

    /// Name of the algorithm new lanes use.
    pub fn algorithm(&self) -> &'static str {
        self.spec.read().unwrap_or_else(PoisonError::into_inner).descriptor.name()
    }

    /// Switch every lane to `name`.
    ///
    /// Only algorithms offering 256-bit strength are accepted. Existing lanes
    /// are dropped and rebuilt on their next use.
    pub fn set_algorithm(&self, name: &str) -> Result<(), CryptoError> {
        let descriptor = registry::lookup(name, false).ok_or(CryptoError::InvalidAlgId)?;
        if descriptor.max_strength() < 256 {
            return Err(CryptoError::NotSupported);
        }
        {
            let mut spec = self.spec.write().unwrap_or_else(PoisonError::into_inner);
            spec.descriptor = descriptor;
        }
        for lane in &self.lanes {
            lane.lock().unwrap_or_else(PoisonError::into_inner).take();
        }
        debug!("pool: switched to {name}");
        Ok(())
    }

    fn lane_index(&self) -> usize {
        thread_tag() as usize % self.lanes.len()
    }

    fn build_lane(&self, index: usize) -> Result<DrbgEngine, DrbgError> {
        let spec = self.spec.read().unwrap_or_else(PoisonError::into_inner).clone();
        let mut engine = DrbgEngine::with_default_source(Arc::clone(&spec.descriptor)).map_err(|e| {
            warn!("pool: lane {index} has no usable seed source: {e}");
            DrbgError::new(DrbgState::Error, reason::LOW_ENTROPY)
        })?;
        engine.set_auto_chunking(spec.auto_chunking);
        engine.instantiate(Instantiate {
            strength: spec.strength,
            prediction_resistance: spec.prediction_resistance,
            ..Default::default()
        })?;
        debug!("pool: lane {index} instantiated with {}", spec.descriptor.name());
        Ok(engine)
    }

    /// Run `op` on the caller's lane, rebuilding the lane once if it fails
    /// with `Error` or `Param`.
    fn with_lane<R>(&self, mut op: impl FnMut(&mut DrbgEngine) -> Result<R, DrbgError>) -> Result<R, DrbgError> {
        let index = self.lane_index();
        let mut lane = self.lanes[index].lock().unwrap_or_else(PoisonError::into_inner);
        let mut rebuilt = false;
        loop {
            if lane.is_none() {
                *lane = Some(self.build_lane(index)?);
            }
            let engine = lane
                .as_mut()
                .ok_or(DrbgError::new(DrbgState::Uninit, reason::NOT_INIT))?;
            match op(engine) {
                Ok(r) => return Ok(r),
                Err(e) if !rebuilt && matches!(e.state, DrbgState::Error | DrbgState::Param) => {
                    warn!("pool: lane {index} failed ({e}); rebuilding");
                    if let Err(ce) = engine.cleanup() {
                        warn!("pool: lane {index} cleanup failed: {ce}");
                    }
                    lane.take();
                    rebuilt = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fill `buf` with random bytes from the caller's lane.
    pub fn fill(&self, buf: &mut [u8]) -> Result<(), DrbgError> {
        self.with_lane(|engine| engine.generate_chunked(buf, &[]))
    }

    /// Like [`fill`](Self::fill), mixing `additional` into the request.
    pub fn fill_with(&self, buf: &mut [u8], additional: &[u8]) -> Result<(), DrbgError> {
        self.with_lane(|engine| engine.generate_chunked(buf, additional))
    }

    /// Fill `buf` with conditioned entropy from the caller's lane source,
    /// bypassing the DRBG.
    ///
    /// A source failure is reported as `Error`, so the lane gets rebuilt
    /// over a fresh source once before the failure reaches the caller.
    pub fn seed(&self, buf: &mut [u8]) -> Result<(), DrbgError> {
        self.with_lane(|engine| {
            engine.generate_seed(buf).map_err(|e| {
                warn!("pool: seed request failed: {e}");
                DrbgError::new(DrbgState::Error, reason::LOW_ENTROPY)
            })
        })
    }

    /// Lowest seed-source estimate over the lanes created so far.
    pub fn entropy_estimate(&self) -> Option<u32> {
        self.lanes
            .iter()
            .filter_map(|lane| {
                lane.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_ref()
                    .map(DrbgEngine::entropy_estimate)
            })
            .min()
    }

    /// Lanes created so far.
    pub fn active_lanes(&self) -> usize {
        self.lanes
            .iter()
            .filter(|lane| lane.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }
}
