//! Icon byte digests.
//!
//! A digest of the raw icon bytes lets the cache detect that a re-fetched
//! icon is unchanged and skip the blob replacement entirely.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hex digest of raw icon bytes.
pub fn icon_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_stability() {
        assert_eq!(icon_digest(b"icon"), icon_digest(b"icon"));
    }

    #[test]
    fn test_digest_differs() {
        assert_ne!(icon_digest(b"icon-a"), icon_digest(b"icon-b"));
    }

    #[test]
    fn test_digest_format() {
        let digest = icon_digest(b"icon");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
