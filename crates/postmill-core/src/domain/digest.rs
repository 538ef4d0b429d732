//! Content fingerprints for score rounds.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of post content.
///
/// Recorded on every [`ScoreRound`](super::ScoreRound) so an audit can tell
/// exactly which text a set of scores refers to.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short form (first 12 hex chars), for log lines.
pub fn short(digest: &str) -> &str {
    &digest[..12.min(digest.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_and_hex() {
        let a = content_digest("hello world");
        let b = content_digest("hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_differs_for_different_content() {
        assert_ne!(content_digest("draft one"), content_digest("draft two"));
    }

    #[test]
    fn test_short_truncates() {
        let d = content_digest("x");
        assert_eq!(short(&d).len(), 12);
        assert_eq!(short("abc"), "abc");
    }
}
