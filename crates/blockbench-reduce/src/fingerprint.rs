//! Content fingerprinting: 128-bit BLAKE3 block digests

use serde::{Serialize, Serializer};

/// Length of a block fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 16;

/// A 128-bit digest identifying a block's content. Used as the dedupe key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Return the fingerprint as a lowercase hex string
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Compute the fingerprint of a block buffer.
///
/// BLAKE3 is an extendable-output hash, so the first 16 bytes of its output
/// are a valid 128-bit digest on their own.
pub fn fingerprint(data: &[u8]) -> Fingerprint {
    let hash = blake3::hash(data);
    let mut out = [0u8; FINGERPRINT_LEN];
    out.copy_from_slice(&hash.as_bytes()[..FINGERPRINT_LEN]);
    Fingerprint(out)
}
