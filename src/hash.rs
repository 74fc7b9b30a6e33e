// src/hash.rs

//! SHA-256 fingerprints for package ids and build plans
//!
//! Fingerprints must be stable across runs and machines, so every input is
//! fed through [`Hasher::field`], which length-prefixes keys and values to
//! keep `("ab", "c")` and `("a", "bc")` from colliding.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const SHA256_HEX_LEN: usize = 64;

/// Incremental SHA-256 hasher producing lowercase hex
#[derive(Clone, Default)]
pub struct Hasher {
    inner: Sha256,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Feed one length-prefixed key/value pair
    pub fn field(&mut self, key: &str, value: &str) -> &mut Self {
        for part in [key, value] {
            self.inner.update((part.len() as u64).to_le_bytes());
            self.inner.update(part.as_bytes());
        }
        self
    }

    /// Finish and return the hex digest
    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Hash data with SHA-256
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Check whether a string looks like a hex SHA-256 digest
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == SHA256_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_fields_are_unambiguous() {
        let mut a = Hasher::new();
        a.field("ab", "c");
        let mut b = Hasher::new();
        b.field("a", "bc");
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_is_sha256_hex() {
        assert!(is_sha256_hex(&sha256(b"")));
        assert!(!is_sha256_hex("abc"));
        assert!(!is_sha256_hex(&"z".repeat(64)));
    }
}
