#![no_main]
use fipsrng_crypto::drbg::hash_drbg::hash_df;
use fipsrng_types::HashAlgId;
use libfuzzer_sys::fuzz_target;

const HASHES: [HashAlgId; 4] = [
    HashAlgId::Sha224,
    HashAlgId::Sha256,
    HashAlgId::Sha384,
    HashAlgId::Sha512,
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let alg = HASHES[data[0] as usize % HASHES.len()];
    let out_len = data[1] as usize;
    let split = (data[2] as usize).min(data.len() - 3);
    let (a, b) = data[3..].split_at(split);

    let mut whole = vec![0u8; out_len];
    let mut parts = vec![0u8; out_len];
    if hash_df(alg, &[&data[3..]], &mut whole).is_ok() {
        hash_df(alg, &[a, b], &mut parts).unwrap();
        assert_eq!(whole, parts);
    }
});
