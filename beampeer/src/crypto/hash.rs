// Cryptographic hashing: BLAKE2b-512 and BLAKE2s-256.
//
// BLAKE2b-512 is the handshake hash (SRP scrambler, verifier derivation,
// phantom salt); BLAKE2s-256 produces the 32-byte session keys both AEAD
// suites require.

use blake2::{Blake2b512, Blake2s256, Digest};

/// BLAKE2b-512 hash over the concatenation of `parts`, returning 64 bytes.
pub fn blake2b512(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// BLAKE2s-256 hash over the concatenation of `parts`, returning 32 bytes.
pub fn blake2s256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2s256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b512_known_vector() {
        // BLAKE2b-512("abc"), RFC 7693 appendix A.
        let h = blake2b512(&[b"abc"]);
        assert_eq!(
            hex::encode(h),
            "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d1\
             7d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923"
        );
    }

    #[test]
    fn blake2s256_known_vector() {
        // BLAKE2s-256("abc"), RFC 7693 appendix B.
        let h = blake2s256(&[b"abc"]);
        assert_eq!(
            hex::encode(h),
            "508c5e8c327c14e2e1a72ba34eeb452f37458b209ed63a294d999b4c86675982"
        );
    }

    #[test]
    fn concatenation_matches_single_buffer() {
        let joined = blake2s256(&[b"hello ", b"world"]);
        let single = blake2s256(&[b"hello world"]);
        assert_eq!(joined, single);
    }

    #[test]
    fn different_input_different_digest() {
        assert_ne!(blake2b512(&[b"hello"]), blake2b512(&[b"world"]));
    }
}
