#![no_main]
use fipsrng_crypto::drbg::ctr_drbg::block_cipher_df;
use fipsrng_types::CipherAlgId;
use libfuzzer_sys::fuzz_target;

const CIPHERS: [CipherAlgId; 3] = [
    CipherAlgId::Aes128Ecb,
    CipherAlgId::Aes192Ecb,
    CipherAlgId::Aes256Ecb,
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let alg = CIPHERS[data[0] as usize % CIPHERS.len()];
    let out_len = alg.key_len() + 16;
    let input = &data[2..];
    let split = (data[1] as usize).min(input.len());

    let mut first = vec![0u8; out_len];
    let mut second = vec![0u8; out_len];
    if block_cipher_df(alg, &[input], &mut first).is_ok() {
        block_cipher_df(alg, &[&input[..split], &input[split..]], &mut second).unwrap();
        assert_eq!(first, second);
    }
});
