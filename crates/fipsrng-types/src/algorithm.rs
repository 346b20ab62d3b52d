use crate::error::CryptoError;

/// Hash algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgId {
    /// Digest output size in bytes.
    pub fn output_size(self) -> usize {
        match self {
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

/// Block cipher identifiers (single-block ECB encryption only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgId {
    Aes128Ecb,
    Aes192Ecb,
    Aes256Ecb,
}

impl CipherAlgId {
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128Ecb => 16,
            Self::Aes192Ecb => 24,
            Self::Aes256Ecb => 32,
        }
    }

    pub fn block_len(self) -> usize {
        16
    }
}

/// DRBG mechanism identifiers, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrbgAlgId {
    HashSha224,
    HashSha256,
    HashSha384,
    HashSha512,
    CtrAes128,
    CtrAes192,
    CtrAes256,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl DrbgAlgId {
    pub const ALL: [DrbgAlgId; 11] = [
        Self::HashSha224,
        Self::HashSha256,
        Self::HashSha384,
        Self::HashSha512,
        Self::CtrAes128,
        Self::CtrAes192,
        Self::CtrAes256,
        Self::HmacSha224,
        Self::HmacSha256,
        Self::HmacSha384,
        Self::HmacSha512,
    ];

    /// Registry name used for lookup.
    pub fn name(self) -> &'static str {
        match self {
            Self::HashSha224 => "SHA224",
            Self::HashSha256 => "SHA256",
            Self::HashSha384 => "SHA384",
            Self::HashSha512 => "SHA512",
            Self::CtrAes128 => "AES-128-ECB",
            Self::CtrAes192 => "AES-192-ECB",
            Self::CtrAes256 => "AES-256-ECB",
            Self::HmacSha224 => "HMAC-SHA224",
            Self::HmacSha256 => "HMAC-SHA256",
            Self::HmacSha384 => "HMAC-SHA384",
            Self::HmacSha512 => "HMAC-SHA512",
        }
    }
}

/// Entropy source (noise driver) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NoiseType {
    /// Timer-jitter sampler.
    Hw,
    /// Operating system generator.
    #[default]
    Os,
    /// Timer-jitter sampler with SP 800-90B continuous health tests.
    Fips,
}

impl NoiseType {
    pub const ALL: [NoiseType; 3] = [Self::Hw, Self::Os, Self::Fips];

    pub fn name(self) -> &'static str {
        match self {
            Self::Hw => "TRNG_HW",
            Self::Os => "TRNG_OS",
            Self::Fips => "TRNG_FIPS",
        }
    }

    /// Health-tested draws folded into every conditioned granule.
    pub fn guarantee(self) -> usize {
        match self {
            Self::Hw | Self::Os => 2,
            Self::Fips => 4,
        }
    }

    /// Resolve an operator-supplied name. Case-insensitive; the `TRNG_`
    /// prefix is optional and the historical aliases are accepted.
    pub fn from_name(name: &str) -> Result<Self, CryptoError> {
        let upper = name.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("TRNG_").unwrap_or(&upper);
        match bare {
            "HW" | "TRNG" | "ALT2" | "ALT3" | "ALT4" => Ok(Self::Hw),
            "OS" | "ALT" => Ok(Self::Os),
            "FIPS" => Ok(Self::Fips),
            _ => Err(CryptoError::InvalidArg),
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Hw => 0,
            Self::Os => 1,
            Self::Fips => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Hw,
            2 => Self::Fips,
            _ => Self::Os,
        }
    }
}

impl std::fmt::Display for NoiseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

static DEFAULT_NOISE: std::sync::atomic::AtomicU8 = std::sync::atomic::AtomicU8::new(1);

/// Process-wide default entropy source type.
pub fn default_noise_type() -> NoiseType {
    NoiseType::from_u8(DEFAULT_NOISE.load(std::sync::atomic::Ordering::Acquire))
}

/// Change the process-wide default entropy source type. Instances notice the
/// change on their next reseed and rebind.
pub fn set_default_noise_type(t: NoiseType) {
    DEFAULT_NOISE.store(t.to_u8(), std::sync::atomic::Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_type_aliases() {
        assert_eq!(NoiseType::from_name("TRNG_HW").unwrap(), NoiseType::Hw);
        assert_eq!(NoiseType::from_name("trng_alt4").unwrap(), NoiseType::Hw);
        assert_eq!(NoiseType::from_name("TRNG_ALT2").unwrap(), NoiseType::Hw);
        assert_eq!(NoiseType::from_name("Trng_Trng").unwrap(), NoiseType::Hw);
        assert_eq!(NoiseType::from_name("TRNG_ALT").unwrap(), NoiseType::Os);
        assert_eq!(NoiseType::from_name("os").unwrap(), NoiseType::Os);
        assert_eq!(NoiseType::from_name(" fips ").unwrap(), NoiseType::Fips);
        assert!(NoiseType::from_name("TRNG_RDRAND").is_err());
        assert!(NoiseType::from_name("").is_err());
    }

    #[test]
    fn test_noise_type_guarantee() {
        assert_eq!(NoiseType::Hw.guarantee(), 2);
        assert_eq!(NoiseType::Os.guarantee(), 2);
        assert_eq!(NoiseType::Fips.guarantee(), 4);
    }

    #[test]
    fn test_noise_type_u8_roundtrip() {
        for t in NoiseType::ALL {
            assert_eq!(NoiseType::from_u8(t.to_u8()), t);
        }
    }

    #[test]
    fn test_drbg_alg_names_unique() {
        let mut names: Vec<_> = DrbgAlgId::ALL.iter().map(|a| a.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), DrbgAlgId::ALL.len());
    }

    #[test]
    fn test_cipher_lengths() {
        assert_eq!(CipherAlgId::Aes192Ecb.key_len(), 24);
        assert_eq!(CipherAlgId::Aes256Ecb.block_len(), 16);
        assert_eq!(HashAlgId::Sha384.output_size(), 48);
    }
}
