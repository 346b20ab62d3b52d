//! Known-answer vectors for every registered DRBG and the routine that
//! replays them against a fresh mechanism.
//!
//! CTR_DRBG vectors are NIST CAVP CTR_DRBG (use df, no prediction
//! resistance) truncations; the HMAC-SHA256 two-generate vector is NIST
//! CAVP HMAC_DRBG. The rest were produced by an independent SP 800-90A
//! implementation over a shared input set.

use super::AlgorithmDescriptor;
use fipsrng_types::CmvpError;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// One known-answer test.
///
/// The mechanism is instantiated with `entropy`, `nonce` and
/// `personalization`. If `reseed_entropy` is non-empty it is reseeded with
/// it and `reseed_additional`. Then one generate call runs per entry of
/// `additional`, each producing `expected.len()` bytes; only the last output
/// is compared. All fields are hex.
#[derive(Debug, Clone, Copy)]
pub struct KatVector {
    pub entropy: &'static str,
    pub nonce: &'static str,
    pub personalization: &'static str,
    pub reseed_entropy: &'static str,
    pub reseed_additional: &'static str,
    pub additional: &'static [&'static str],
    pub expected: &'static str,
}

const ENTROPY: &str = "a65ad0f345db4e0effe875c3a2e71f42c7129d620ff5c119a9ef55f05185e0fb";
const NONCE: &str = "8581f9317517276e06e9607ddbcbcc2e";
const PERS: &str = "6c57d0f58369d721d02ad5228f6a00a2";
const RESEED: &str = "f23ec223474a38cc89cbb77fe1040e70f60d1bd11f6e968ac8fe1c3623fc7e5f";
// "reseed additional" / "generate additional"
const RESEED_AAD: &str = "726573656564206164646974696f6e616c";
const GENERATE_AAD: &str = "67656e6572617465206164646974696f6e616c";

const NO_ADDITIONAL: &[&str] = &[""];
const GENERATE_ONLY: &[&str] = &[GENERATE_AAD];

const fn plain(expected: &'static str) -> KatVector {
    KatVector {
        entropy: ENTROPY,
        nonce: NONCE,
        personalization: PERS,
        reseed_entropy: "",
        reseed_additional: "",
        additional: NO_ADDITIONAL,
        expected,
    }
}

const fn reseeded(expected: &'static str) -> KatVector {
    KatVector {
        entropy: ENTROPY,
        nonce: NONCE,
        personalization: PERS,
        reseed_entropy: RESEED,
        reseed_additional: RESEED_AAD,
        additional: GENERATE_ONLY,
        expected,
    }
}

pub(crate) static HASH_SHA224: &[KatVector] =
    &[plain("ec52f7be5eeea55bafa1dfb8937a33576727fffc31fc7e74a8ef27310ca27d8d")];

pub(crate) static HASH_SHA256: &[KatVector] = &[
    plain("07d1b52618ecba9de830814c3d84f1f1190629b50758b9839bfaaa1c76b9974c"),
    reseeded("b7142612f1b09026c59ce5dd16c90c23de966bb717d7912e779354e61c7ca143"),
];

pub(crate) static HASH_SHA384: &[KatVector] = &[
    plain("8843c075e0e01eab3a119bae14d7209ac48f8a4a99a5075a05b8e5450b3dc53e"),
    reseeded("37abe303115a1b3eff66d4e0715d0f1c26d59b6f571ddc47d21dda1697835df6"),
];

pub(crate) static HASH_SHA512: &[KatVector] =
    &[plain("d21ae51b077565873c9a47d919d0bfd3962ab15b1d9d69832e195b830de41858")];

pub(crate) static CTR_AES128: &[KatVector] = &[KatVector {
    entropy: "52642ee03ffc52e912bdcf5c05cebeed",
    nonce: "f05d8599e5150461",
    personalization: "6c57d0f58369d721d02ad5228f6a00a2",
    reseed_entropy: "",
    reseed_additional: "",
    additional: NO_ADDITIONAL,
    expected: "832073439efaa4f791c68be2d94beab6f57c9b695589179215732cd17b25b570\
               c22c5d6b43dc7a7810278aa03d3ce1e11a65abe1f4eb5b1f136e21ae1dcafe25",
}];

pub(crate) static CTR_AES192: &[KatVector] = &[KatVector {
    entropy: "49036024ee3ead55dab0789d8d809adacb10820c501c8093",
    nonce: "ffce8b0dc00a0e37e41f2d6dd13b6b56",
    personalization: "",
    reseed_entropy: "d35405984090cab12fcabaaeba4b4e36b91869782ed86327",
    reseed_additional: "",
    additional: NO_ADDITIONAL,
    expected: "7a57cdc313383aa2",
}];

pub(crate) static CTR_AES256: &[KatVector] = &[KatVector {
    entropy: "acd4d2ed56726b5234b006f9e592c6927f4c6b97290c0abbf9050d960abd6c90",
    nonce: "58c7ba7f78cc562bb318ddc2003f42ac",
    personalization: "",
    reseed_entropy: RESEED,
    reseed_additional: "",
    additional: NO_ADDITIONAL,
    expected: "220a32051700850b",
}];

pub(crate) static HMAC_SHA224: &[KatVector] =
    &[plain("42677d962e19f65416efe884b2e98742f173527e288d74858f775632417eae1c")];

pub(crate) static HMAC_SHA256: &[KatVector] = &[
    plain("19810b2c8c3b4660552092782d14bcdb1f8b51aa5c3134b3df3703907ad4d750"),
    // NIST CAVP HMAC_DRBG SHA-256, PR=False, with reseed.
    KatVector {
        entropy: "cdb0d9117cc6dbc9ef9dcb06a97579841d72dc18b2d46a1cb61e314012bdf416",
        nonce: "d0c0d01d156016d0eb6b7e9c7c3c8da8",
        personalization: "6f0fb9eab3f9ea7ab0a719bfa879bf0aaed683307fda0c6d73ce018b6e34faaa",
        reseed_entropy: "8ec6f7d5a8e2e88f43986f70b86e050d07c84b931bcf18e601c5a3eee3064c82",
        reseed_additional: "1ab4ca9014fa98a55938316de8ba5a68c629b0741bdd058c4d70c91cda5099b3",
        additional: &[
            "16e2d0721b58d839a122852abd3bf2c942a31c84d82fca74211871880d7162ff",
            "53686f042a7b087d5d2eca0d2a96de131f275ed7151189f7ca52deaa78b79fb2",
        ],
        expected: "dda04a2ca7b8147af1548f5d086591ca4fd951a345ce52b3cd49d47e84aa31a1\
                   83e31fbc42a1ff1d95afec7143c8008c97bc2a9c091df0a763848391f68cb4a3\
                   66ad89857ac725a53b303ddea767be8dc5f605b1b95f6d24c9f06be65a973a08\
                   9320b3cc42569dcfd4b92b62a993785b0301b3fc452445656fce22664827b88f",
    },
];

pub(crate) static HMAC_SHA384: &[KatVector] =
    &[plain("d210c0d6a1253effa7f41029a30d52a8704d9c95060600999a5ab0a3fc68fb97")];

pub(crate) static HMAC_SHA512: &[KatVector] = &[
    plain("3c8d1e24da03abf368d51f0233f87f817b3fb0d145cbcb26672a2716ee599508"),
    reseeded("7308c4d974d8fd34f4144a4062f460160d5e150e015440bb99149928e9582b44"),
];

fn hex(s: &str) -> Result<Zeroizing<Vec<u8>>, CmvpError> {
    if s.len() % 2 != 0 {
        return Err(CmvpError::KatFailure(format!("odd-length vector: {s}")));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|b| u8::from_str_radix(b, 16).ok())
                .ok_or_else(|| CmvpError::KatFailure(format!("malformed vector: {s}")))
        })
        .collect::<Result<Vec<u8>, _>>()
        .map(Zeroizing::new)
}

/// Replay every vector of `desc` against a fresh mechanism.
///
/// Each vector also checks that cleanup leaves no working state behind.
pub fn run(desc: &AlgorithmDescriptor) -> Result<(), CmvpError> {
    for (index, vector) in desc.known_answers().iter().enumerate() {
        run_vector(desc, index, vector)?;
    }
    Ok(())
}

fn run_vector(desc: &AlgorithmDescriptor, index: usize, v: &KatVector) -> Result<(), CmvpError> {
    let name = desc.name();
    let fail = |step: &str, e: &dyn std::fmt::Display| {
        CmvpError::KatFailure(format!("{name} #{index} {step}: {e}"))
    };

    let mut mech = desc
        .kind()
        .build(desc.primitive())
        .map_err(|e| fail("build", &e))?;

    let entropy = hex(v.entropy)?;
    let nonce = hex(v.nonce)?;
    let pers = hex(v.personalization)?;
    mech.instantiate(&entropy, &nonce, &pers)
        .map_err(|e| fail("instantiate", &e))?;

    if !v.reseed_entropy.is_empty() {
        let entropy = hex(v.reseed_entropy)?;
        let additional = hex(v.reseed_additional)?;
        mech.reseed(&entropy, &additional)
            .map_err(|e| fail("reseed", &e))?;
    }

    let expected = hex(v.expected)?;
    let mut out = Zeroizing::new(vec![0u8; expected.len()]);
    for additional in v.additional {
        let additional = hex(additional)?;
        mech.generate(&mut out, &additional)
            .map_err(|e| fail("generate", &e))?;
    }

    let matched = bool::from(out[..].ct_eq(&expected[..]));
    mech.cleanup();
    if !matched {
        return Err(CmvpError::KatFailure(format!("{name} #{index}: output mismatch")));
    }
    if !mech.is_zeroized() {
        return Err(CmvpError::KatFailure(format!("{name} #{index}: cleanup left state behind")));
    }
    Ok(())
}
