// X25519 key agreement for the optional handshake pre-key.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{BeamPeerError, Result};

/// An X25519 key pair.
///
/// The server installs one from a caller-owned private key before the
/// handshake starts; a fresh one can also be generated per instance. The
/// pair is read-only once the handshake is running.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Load a key pair from 32 private-key bytes.
    pub fn from_private_key(private_key: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = private_key.try_into().map_err(|_| {
            BeamPeerError::InvalidKey(format!(
                "private key must be 32 bytes, got {}",
                private_key.len()
            ))
        })?;
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    /// The 32-byte public key.
    pub fn public_key(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Diffie-Hellman with a peer's public key.
    ///
    /// Returns `None` when the peer key is malformed or the exchange is
    /// non-contributory (a low-order peer key yielding an all-zero secret).
    pub fn session_key(&self, peer_public: &[u8]) -> Option<[u8; 32]> {
        let bytes: [u8; 32] = peer_public.try_into().ok()?;
        let shared = self.secret.diffie_hellman(&PublicKey::from(bytes));
        if !shared.was_contributory() {
            return None;
        }
        Some(*shared.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_secret_matches() {
        let server = KeyPair::generate();
        let client = KeyPair::generate();

        let from_server = server.session_key(&client.public_key()).unwrap();
        let from_client = client.session_key(&server.public_key()).unwrap();
        assert_eq!(from_server, from_client);
    }

    #[test]
    fn private_key_roundtrip() {
        let original = KeyPair::generate();
        let reloaded = KeyPair::from_private_key(original.secret.as_bytes()).unwrap();
        assert_eq!(original.public_key(), reloaded.public_key());
    }

    #[test]
    fn wrong_length_private_key_rejected() {
        assert!(KeyPair::from_private_key(&[0u8; 16]).is_err());
        assert!(KeyPair::from_private_key(&[]).is_err());
    }

    #[test]
    fn malformed_peer_key_rejected() {
        let kp = KeyPair::generate();
        assert!(kp.session_key(&[1u8; 31]).is_none());
        assert!(kp.session_key(&[]).is_none());
    }

    #[test]
    fn low_order_peer_key_rejected() {
        // The identity point forces an all-zero shared secret.
        let kp = KeyPair::generate();
        assert!(kp.session_key(&[0u8; 32]).is_none());
    }
}
