//! SHA-2 digests and HMAC, adapted onto the provider traits.

use crate::provider::{Digest, Mac};
use fipsrng_types::{CryptoError, HashAlgId};
use hmac::digest::{KeyInit, OutputSizeUser};
use zeroize::Zeroizing;

/// SHA-2 digest context backed by the `sha2` crate.
pub struct Sha2Digest<D> {
    inner: D,
}

impl<D: sha2::Digest> Sha2Digest<D> {
    pub fn new() -> Self {
        Sha2Digest {
            inner: <D as sha2::Digest>::new(),
        }
    }
}

impl<D: sha2::Digest> Default for Sha2Digest<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Digest for Sha2Digest<D>
where
    D: sha2::Digest + Send + Sync,
{
    fn output_size(&self) -> usize {
        <D as sha2::Digest>::output_size()
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        sha2::Digest::update(&mut self.inner, data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let n = <D as sha2::Digest>::output_size();
        if out.len() < n {
            return Err(CryptoError::BufferTooSmall {
                need: n,
                got: out.len(),
            });
        }
        let ctx = std::mem::replace(&mut self.inner, <D as sha2::Digest>::new());
        out[..n].copy_from_slice(&sha2::Digest::finalize(ctx));
        Ok(())
    }

    fn reset(&mut self) {
        self.inner = <D as sha2::Digest>::new();
    }
}

/// HMAC context backed by the `hmac` crate. The key is retained so the
/// context can be re-armed after every `finish`.
struct HmacCtx<M> {
    inner: M,
    key: Zeroizing<Vec<u8>>,
}

impl<M> HmacCtx<M>
where
    M: hmac::Mac + KeyInit,
{
    fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let inner = <M as KeyInit>::new_from_slice(key).map_err(|_| CryptoError::InvalidArg)?;
        Ok(HmacCtx {
            inner,
            key: Zeroizing::new(key.to_vec()),
        })
    }
}

impl<M> Mac for HmacCtx<M>
where
    M: hmac::Mac + KeyInit + Send,
{
    fn output_size(&self) -> usize {
        <M as OutputSizeUser>::output_size()
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        hmac::Mac::update(&mut self.inner, data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let n = <M as OutputSizeUser>::output_size();
        if out.len() < n {
            return Err(CryptoError::BufferTooSmall {
                need: n,
                got: out.len(),
            });
        }
        let fresh = <M as KeyInit>::new_from_slice(&self.key).map_err(|_| CryptoError::InvalidArg)?;
        let ctx = std::mem::replace(&mut self.inner, fresh);
        out[..n].copy_from_slice(&hmac::Mac::finalize(ctx).into_bytes());
        Ok(())
    }
}

/// Create a digest context for `id`.
pub fn new_digest(id: HashAlgId) -> Box<dyn Digest> {
    match id {
        HashAlgId::Sha224 => Box::new(Sha2Digest::<sha2::Sha224>::new()),
        HashAlgId::Sha256 => Box::new(Sha2Digest::<sha2::Sha256>::new()),
        HashAlgId::Sha384 => Box::new(Sha2Digest::<sha2::Sha384>::new()),
        HashAlgId::Sha512 => Box::new(Sha2Digest::<sha2::Sha512>::new()),
    }
}

/// Create an HMAC context over `id` keyed with `key`.
pub fn new_hmac(id: HashAlgId, key: &[u8]) -> Result<Box<dyn Mac>, CryptoError> {
    Ok(match id {
        HashAlgId::Sha224 => Box::new(HmacCtx::<hmac::Hmac<sha2::Sha224>>::new(key)?),
        HashAlgId::Sha256 => Box::new(HmacCtx::<hmac::Hmac<sha2::Sha256>>::new(key)?),
        HashAlgId::Sha384 => Box::new(HmacCtx::<hmac::Hmac<sha2::Sha384>>::new(key)?),
        HashAlgId::Sha512 => Box::new(HmacCtx::<hmac::Hmac<sha2::Sha512>>::new(key)?),
    })
}

/// One-shot digest over the concatenation of `parts`.
pub fn digest(id: HashAlgId, parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError> {
    let mut ctx = new_digest(id);
    for part in parts {
        ctx.update(part)?;
    }
    let mut out = vec![0u8; ctx.output_size()];
    ctx.finish(&mut out)?;
    Ok(out)
}

/// One-shot HMAC over the concatenation of `parts`.
pub fn hmac(id: HashAlgId, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError> {
    let mut ctx = new_hmac(id, key)?;
    for part in parts {
        ctx.update(part)?;
    }
    let mut out = vec![0u8; ctx.output_size()];
    ctx.finish(&mut out)?;
    Ok(out)
}
