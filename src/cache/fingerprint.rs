//! Content Fingerprint Module
//!
//! SHA-256 digest of request content, used as the content component of cache keys.

use std::fmt;

use sha2::{Digest, Sha256};

// == Fingerprint ==
/// Fixed-length digest of arbitrary byte content.
///
/// Text and audio are hashed identically as raw bytes. Only equality is
/// meaningful; the ordering of digests carries no information.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hashes `content`. Deterministic, infallible.
    pub fn of(content: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(content.as_ref());
        Self(digest.into())
    }

    /// Lowercase hex rendering, as embedded in cache keys.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        assert_eq!(
            Fingerprint::of("abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            Fingerprint::of(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_text_and_bytes_agree() {
        let text = "hello world";
        assert_eq!(Fingerprint::of(text), Fingerprint::of(text.as_bytes().to_vec()));
    }

    #[test]
    fn test_single_byte_difference() {
        assert_ne!(Fingerprint::of([0u8, 1, 2]), Fingerprint::of([0u8, 1, 3]));
    }

    #[test]
    fn test_display_is_hex() {
        let fp = Fingerprint::of("x");
        assert_eq!(fp.to_string().len(), 64);
        assert!(fp.to_string().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
