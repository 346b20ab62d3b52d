use std::fmt;

/// Lifecycle state of a DRBG instance (SP 800-90A §9).
///
/// `Crit` is absorbing. `Error` and `Param` freeze the instance until it is
/// instantiated again (or, for `Error`, reseeded once the source recovers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrbgState {
    /// No working state; the instance must be instantiated before use.
    #[default]
    Uninit,
    /// Instantiated, no output produced yet.
    Init,
    /// Producing output.
    Run,
    /// The reseed interval was reached; the next request must reseed first.
    Reseed,
    /// Transient environmental failure (e.g. entropy exhaustion).
    Error,
    /// Caller parameter error; nothing was forwarded to the mechanism.
    Param,
    /// Integrity failure. Never recoverable.
    Crit,
}

impl DrbgState {
    /// States from which `generate` may run.
    pub fn can_generate(self) -> bool {
        matches!(self, Self::Init | Self::Run | Self::Reseed)
    }

    /// States that block every further operation except cleanup/instantiate.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Error | Self::Param | Self::Crit)
    }

    /// Upper-case name as reported to operators.
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninit => "UNINIT",
            Self::Init => "INIT",
            Self::Run => "RUN",
            Self::Reseed => "RESEED",
            Self::Error => "ERROR",
            Self::Param => "PARAM",
            Self::Crit => "CRIT",
        }
    }
}

impl fmt::Display for DrbgState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
