// Cryptographically strong random byte generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// AEAD nonce size shared by AES-256-GCM and ChaCha20-Poly1305.
pub const IV_SIZE: usize = 12;

/// `len` random bytes from the OS CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// A fresh 12-byte AEAD nonce.
pub fn random_iv() -> Vec<u8> {
    random_bytes(IV_SIZE)
}
