//! Small staging buffer between a noise driver and its consumer.
//!
//! `get` hands out one byte at a time and refills all 64 bytes through a
//! callback when it runs dry, so a driver that is expensive per call (a
//! syscall, a lock) is hit once per 64 bytes. `merge` XORs timing samples
//! into the buffer at a rolling position; those bytes are not entropy, only
//! hardening data appended at the compression step.

use fipsrng_types::CryptoError;
use zeroize::Zeroize;

/// MiniBuffer size in bytes.
pub const MINIBUF_SIZE: usize = 64;

pub struct MiniBuffer {
    buffer: [u8; MINIBUF_SIZE],
    /// Next position to read (counts down) or merge (counts up).
    /// `None` means the buffer holds nothing usable.
    index: Option<usize>,
}

impl MiniBuffer {
    pub fn new() -> Self {
        MiniBuffer {
            buffer: [0u8; MINIBUF_SIZE],
            index: None,
        }
    }

    /// Return the next byte, refilling through `fill` when empty.
    pub fn get<F>(&mut self, fill: F) -> Result<u8, CryptoError>
    where
        F: FnOnce(&mut [u8]) -> Result<(), CryptoError>,
    {
        let idx = match self.index {
            Some(i) if i < MINIBUF_SIZE => i,
            _ => {
                fill(&mut self.buffer)?;
                MINIBUF_SIZE - 1
            }
        };
        let byte = self.buffer[idx];
        self.buffer[idx] = 0;
        self.index = idx.checked_sub(1);
        Ok(byte)
    }

    /// XOR `v` into the buffer at the rolling merge position.
    pub fn merge(&mut self, v: u8) {
        let idx = match self.index {
            Some(i) if i < MINIBUF_SIZE => i,
            _ => 0,
        };
        self.buffer[idx] ^= v;
        self.index = Some(idx + 1);
    }

    /// Raw view of the buffer contents.
    pub fn as_bytes(&self) -> &[u8; MINIBUF_SIZE] {
        &self.buffer
    }

    /// Zero the buffer and mark it empty.
    pub fn clear(&mut self) {
        self.buffer.zeroize();
        self.index = None;
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none()
    }
}

impl Default for MiniBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MiniBuffer {
    fn drop(&mut self) {
        self.buffer.zeroize();
    }
}
