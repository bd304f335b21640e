//! Manifest checksums.
//!
//! Servers may publish the MD5 of their manifest next to its URL. The digest
//! only guards against truncated or corrupted transfers; it is not a
//! signature and carries no authenticity guarantee.

use md5::{Digest, Md5};

/// Lowercase hex MD5 of `bytes`.
#[must_use]
pub fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}

/// Compare `bytes` against an expected hex digest.
///
/// A missing or blank expectation means the server did not ask for
/// verification, so the check passes.
#[must_use]
#[allow(dead_code)]
pub fn verify(bytes: &[u8], expected: Option<&str>) -> bool {
    verify_digest(&digest_hex(bytes), expected)
}

/// Same rules as [`verify`] for a digest that was already computed.
#[must_use]
pub(crate) fn verify_digest(actual: &str, expected: Option<&str>) -> bool {
    match expected.map(str::trim).filter(|value| !value.is_empty()) {
        None => true,
        Some(expected) => actual.eq_ignore_ascii_case(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        assert_eq!(digest_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digest_hex(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn digest_is_deterministic() {
        let data = b"<manifest><label>x</label></manifest>";
        assert_eq!(digest_hex(data), digest_hex(data));
        assert_ne!(digest_hex(data), digest_hex(b"<manifest/>"));
    }

    #[test]
    fn blank_expectation_always_passes() {
        assert!(verify(b"anything", None));
        assert!(verify(b"anything", Some("")));
        assert!(verify(b"", Some("   ")));
    }

    #[test]
    fn comparison_ignores_case_and_padding() {
        assert!(verify(b"hello world", Some("5EB63BBBE01EEED093CB22BB8F5ACDC3")));
        assert!(verify(b"hello world", Some(" 5eb63bbbe01eeed093cb22bb8f5acdc3\n")));
        assert!(!verify(b"hello world!", Some("5eb63bbbe01eeed093cb22bb8f5acdc3")));
    }

    #[test]
    fn precomputed_digest_follows_same_rules() {
        let digest = digest_hex(b"hello world");
        assert!(verify_digest(&digest, None));
        assert!(verify_digest(&digest, Some("5EB63BBBE01EEED093CB22BB8F5ACDC3")));
        assert!(!verify_digest(&digest, Some("d41d8cd98f00b204e9800998ecf8427e")));
    }
}
