//! Blake3 fingerprints for votes, merkle nodes and block seals.
//!
//! Every fingerprint the ledger stores is the lowercase hex of a blake3
//! digest, so it is always [`FINGERPRINT_LEN`] characters long.

/// Length of a hex-encoded fingerprint.
pub const FINGERPRINT_LEN: usize = 64;

/// Hex fingerprint of arbitrary data.
pub fn digest_hex(data: &[u8]) -> String {
    hex::encode(blake3::hash(data).as_bytes())
}

/// Hex fingerprint of the concatenation of several string parts.
///
/// Equivalent to `digest_hex` over the joined string, without building it.
pub fn digest_concat_hex(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        assert_eq!(digest_hex(b"hello world"), digest_hex(b"hello world"));
        assert_ne!(digest_hex(b"hello"), digest_hex(b"world"));
    }

    #[test]
    fn test_digest_hex_is_fixed_length_lowercase() {
        let fp = digest_hex(b"vote");
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_digest_concat_matches_joined_input() {
        assert_eq!(digest_concat_hex(&["ab", "cd"]), digest_hex(b"abcd"));
        assert_eq!(digest_concat_hex(&[]), digest_hex(b""));
    }
}
