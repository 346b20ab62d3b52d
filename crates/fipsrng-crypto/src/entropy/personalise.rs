//! Personalization string synthesis.
//!
//! Used when a caller instantiates without its own personalization data and
//! to seed the conditioner. None of this is secret or counted as entropy;
//! it makes instances on different hosts, processes and threads diverge.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Maximum host-name bytes carried.
const HOST_NAME_LEN: usize = 80;

/// Length of a synthesized personalization string:
/// time (16) ‖ counter (8) ‖ pid (4) ‖ tid (4) ‖ host name (80).
pub const PERSONALIZATION_LEN: usize = 16 + 8 + 4 + 4 + HOST_NAME_LEN;

fn host_name() -> &'static [u8] {
    static NAME: OnceLock<Vec<u8>> = OnceLock::new();
    NAME.get_or_init(|| {
        let name = std::fs::read_to_string("/etc/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "localhost".to_string());
        let mut bytes = name.into_bytes();
        bytes.truncate(HOST_NAME_LEN - 1);
        bytes
    })
}

/// Monotonic nanosecond counter relative to first use in this process.
pub fn counter() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// 32-bit digest of the current thread id.
pub fn thread_tag() -> u32 {
    let mut h = DefaultHasher::new();
    std::thread::current().id().hash(&mut h);
    h.finish() as u32
}

/// Build a fresh personalization string.
pub fn personalization() -> [u8; PERSONALIZATION_LEN] {
    let mut out = [0u8; PERSONALIZATION_LEN];
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let mut pos = 0;
    let mut put = |bytes: &[u8]| {
        out[pos..pos + bytes.len()].copy_from_slice(bytes);
        pos += bytes.len();
    };
    put(&now.as_secs().to_le_bytes());
    put(&u64::from(now.subsec_micros()).to_le_bytes());
    put(&counter().to_le_bytes());
    put(&std::process::id().to_le_bytes());
    put(&thread_tag().to_le_bytes());
    put(host_name());

    // Pad whatever the host name left with folded counter bytes.
    let mut s = 0u8;
    for b in out[pos..].iter_mut() {
        s = counter().to_le_bytes().iter().fold(s, |acc, x| acc ^ x);
        *b = s;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personalization_layout() {
        let p = personalization();
        assert_eq!(p.len(), 112);
        let pid = u32::from_le_bytes(p[24..28].try_into().unwrap());
        assert_eq!(pid, std::process::id());
        let host = host_name();
        assert_eq!(&p[32..32 + host.len()], host);
    }

    #[test]
    fn test_personalization_differs_between_calls() {
        let a = personalization();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = personalization();
        assert_ne!(a, b);
    }

    #[test]
    fn test_personalization_differs_between_threads() {
        let here = thread_tag();
        let there = std::thread::spawn(thread_tag).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_counter_is_monotonic() {
        let a = counter();
        let b = counter();
        assert!(b >= a);
    }
}
