// AEAD cipher negotiation and message ciphers: AES-256-GCM and
// ChaCha20-Poly1305 (RFC 8439).
//
// Wire bitmask values are fixed for interop:
//   0x01 ENCRYPTION_AES256_GCM
//   0x02 ENCRYPTION_CHACHA20_POLY1305

// Both aes-gcm and chacha20poly1305 re-export the same `aead` traits.
// Import once from aes_gcm to avoid redundant imports.
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

use crate::crypto::random::IV_SIZE;
use crate::error::{BeamPeerError, Result};

/// Negotiated AEAD suite (wire bitmask value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    /// AES-256-GCM — bit 0x01.
    Aes256Gcm,
    /// ChaCha20-Poly1305 — bit 0x02.
    ChaCha20Poly1305,
}

impl Encryption {
    pub const AES256_GCM: u32 = 0x01;
    pub const CHACHA20_POLY1305: u32 = 0x02;

    /// The single bit this suite occupies in the negotiation bitmask.
    pub fn bit(self) -> u32 {
        match self {
            Encryption::Aes256Gcm => Self::AES256_GCM,
            Encryption::ChaCha20Poly1305 => Self::CHACHA20_POLY1305,
        }
    }

    /// Resolve a single-suite wire value.
    pub fn from_bit(value: u32) -> Option<Self> {
        match value {
            Self::AES256_GCM => Some(Encryption::Aes256Gcm),
            Self::CHACHA20_POLY1305 => Some(Encryption::ChaCha20Poly1305),
            _ => None,
        }
    }

    /// True if the offered bitmask contains at least one suite we support.
    pub fn any_supported(mask: u32) -> bool {
        mask & (Self::AES256_GCM | Self::CHACHA20_POLY1305) != 0
    }

    /// Pick the server's suite from the client's offer.
    ///
    /// AES-256-GCM is chosen iff the client offered it and this host has
    /// hardware AES; otherwise ChaCha20-Poly1305, which is faster without
    /// acceleration.
    pub fn select(offered_mask: u32, aes_hw: bool) -> Self {
        if offered_mask & Self::AES256_GCM != 0 && aes_hw {
            Encryption::Aes256Gcm
        } else {
            Encryption::ChaCha20Poly1305
        }
    }
}

/// Whether the host CPU exposes AES acceleration.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn aes_hw_accelerated() -> bool {
    std::arch::is_x86_feature_detected!("aes")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn aes_hw_accelerated() -> bool {
    false
}

/// Little-endian nonce increment, one step per sealed message.
fn increment_nonce(nonce: &mut [u8; IV_SIZE]) {
    for byte in nonce.iter_mut() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

enum Cipher {
    Aes256Gcm(Aes256Gcm),
    ChaCha20Poly1305(ChaCha20Poly1305),
}

impl Cipher {
    fn new(suite: Encryption, key: &[u8; 32]) -> Result<Self> {
        match suite {
            Encryption::Aes256Gcm => Aes256Gcm::new_from_slice(key)
                .map(Cipher::Aes256Gcm)
                .map_err(|_| BeamPeerError::InvalidKey("aes-256-gcm key".into())),
            Encryption::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
                .map(Cipher::ChaCha20Poly1305)
                .map_err(|_| BeamPeerError::InvalidKey("chacha20-poly1305 key".into())),
        }
    }

    fn encrypt(&self, nonce: &[u8; IV_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Cipher::Aes256Gcm(c) => c
                .encrypt(AesNonce::from_slice(nonce), plaintext)
                .map_err(|_| BeamPeerError::Encryption),
            Cipher::ChaCha20Poly1305(c) => c
                .encrypt(Nonce::from_slice(nonce), plaintext)
                .map_err(|_| BeamPeerError::Encryption),
        }
    }

    fn decrypt(&self, nonce: &[u8; IV_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Cipher::Aes256Gcm(c) => c
                .decrypt(AesNonce::from_slice(nonce), ciphertext)
                .map_err(|_| BeamPeerError::Decryption),
            Cipher::ChaCha20Poly1305(c) => c
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| BeamPeerError::Decryption),
        }
    }
}

/// Seals outbound messages with the negotiated suite.
///
/// The nonce starts at the handshake's `encrypt_iv` and advances once per
/// message, mirroring the peer's decryptor.
pub struct MessageEncryptor {
    cipher: Cipher,
    nonce: [u8; IV_SIZE],
}

impl MessageEncryptor {
    pub fn new(suite: Encryption, key: &[u8; 32], iv: &[u8]) -> Result<Self> {
        Ok(Self {
            cipher: Cipher::new(suite, key)?,
            nonce: iv_array(iv)?,
        })
    }

    /// Encrypt one message; returns ciphertext with the 16-byte tag appended.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let sealed = self.cipher.encrypt(&self.nonce, plaintext)?;
        increment_nonce(&mut self.nonce);
        Ok(sealed)
    }
}

/// Opens inbound messages with the negotiated suite.
pub struct MessageDecryptor {
    cipher: Cipher,
    nonce: [u8; IV_SIZE],
}

impl MessageDecryptor {
    pub fn new(suite: Encryption, key: &[u8; 32], iv: &[u8]) -> Result<Self> {
        Ok(Self {
            cipher: Cipher::new(suite, key)?,
            nonce: iv_array(iv)?,
        })
    }

    /// Decrypt one message (ciphertext includes the appended tag).
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let opened = self.cipher.decrypt(&self.nonce, ciphertext)?;
        increment_nonce(&mut self.nonce);
        Ok(opened)
    }
}

fn iv_array(iv: &[u8]) -> Result<[u8; IV_SIZE]> {
    iv.try_into().map_err(|_| BeamPeerError::InvalidField {
        field: "iv",
        reason: format!("expected {IV_SIZE} bytes, got {}", iv.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];
    const IV: [u8; 12] = [0x07; 12];

    fn pair(suite: Encryption) -> (MessageEncryptor, MessageDecryptor) {
        (
            MessageEncryptor::new(suite, &KEY, &IV).unwrap(),
            MessageDecryptor::new(suite, &KEY, &IV).unwrap(),
        )
    }

    #[test]
    fn select_prefers_aes_only_with_hardware() {
        let both = Encryption::AES256_GCM | Encryption::CHACHA20_POLY1305;
        assert_eq!(Encryption::select(both, true), Encryption::Aes256Gcm);
        assert_eq!(Encryption::select(both, false), Encryption::ChaCha20Poly1305);
        // AES hardware cannot override a client that never offered AES.
        assert_eq!(
            Encryption::select(Encryption::CHACHA20_POLY1305, true),
            Encryption::ChaCha20Poly1305
        );
        assert_eq!(
            Encryption::select(Encryption::AES256_GCM, false),
            Encryption::ChaCha20Poly1305
        );
    }

    #[test]
    fn bitmask_values_are_stable() {
        assert_eq!(Encryption::Aes256Gcm.bit(), 0x01);
        assert_eq!(Encryption::ChaCha20Poly1305.bit(), 0x02);
        assert_eq!(Encryption::from_bit(0x01), Some(Encryption::Aes256Gcm));
        assert_eq!(Encryption::from_bit(0x02), Some(Encryption::ChaCha20Poly1305));
        assert_eq!(Encryption::from_bit(0x03), None);
        assert_eq!(Encryption::from_bit(0), None);
    }

    #[test]
    fn chacha_stream_roundtrip() {
        let (mut enc, mut dec) = pair(Encryption::ChaCha20Poly1305);
        for msg in [&b"first"[..], b"second", b"third"] {
            let sealed = enc.encrypt(msg).unwrap();
            assert_eq!(dec.decrypt(&sealed).unwrap(), msg);
        }
    }

    #[test]
    fn aes_gcm_stream_roundtrip() {
        let (mut enc, mut dec) = pair(Encryption::Aes256Gcm);
        for msg in [&b"first"[..], b"second", b"third"] {
            let sealed = enc.encrypt(msg).unwrap();
            assert_eq!(dec.decrypt(&sealed).unwrap(), msg);
        }
    }

    #[test]
    fn nonce_advances_between_messages() {
        let (mut enc, _) = pair(Encryption::ChaCha20Poly1305);
        let a = enc.encrypt(b"same plaintext").unwrap();
        let b = enc.encrypt(b"same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_order_decrypt_fails() {
        let (mut enc, mut dec) = pair(Encryption::Aes256Gcm);
        let first = enc.encrypt(b"one").unwrap();
        let second = enc.encrypt(b"two").unwrap();
        // Skipping `first` desynchronizes the nonce.
        assert!(dec.decrypt(&second).is_err());
        assert_eq!(dec.decrypt(&first).unwrap(), b"one");
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let (mut enc, mut dec) = pair(Encryption::ChaCha20Poly1305);
        let mut sealed = enc.encrypt(b"data").unwrap();
        sealed[0] ^= 0xFF;
        assert!(dec.decrypt(&sealed).is_err());
    }

    #[test]
    fn bad_iv_length_rejected() {
        assert!(MessageEncryptor::new(Encryption::Aes256Gcm, &KEY, &[0u8; 11]).is_err());
        assert!(MessageDecryptor::new(Encryption::Aes256Gcm, &KEY, &[]).is_err());
    }

    #[test]
    fn nonce_increment_carries() {
        let mut nonce = [0xFFu8; IV_SIZE];
        nonce[2] = 0x00;
        increment_nonce(&mut nonce);
        assert_eq!(nonce[0], 0x00);
        assert_eq!(nonce[1], 0x00);
        assert_eq!(nonce[2], 0x01);
    }
}
