//! User records and the read-only list the authenticator consults.

use num_bigint::BigUint;
use zeroize::Zeroizing;

use crate::crypto::random::random_bytes;
use crate::error::{BeamPeerError, Result};
use crate::srp::{groups, math};

const SALT_SIZE: usize = 64;
const SEED_KEY_SIZE: usize = 64;

/// One stored user: name, SRP group id, salt, verifier, permitted session
/// bitmask, and flag bits.
#[derive(Clone)]
pub struct User {
    pub name: String,
    pub group: u32,
    pub salt: Vec<u8>,
    pub verifier: Vec<u8>,
    pub sessions: u32,
    pub flags: u32,
}

impl User {
    /// The account may authenticate. Disabled records behave exactly like
    /// absent ones.
    pub const ENABLED: u32 = 0x01;

    /// Group for newly created records.
    pub const DEFAULT_GROUP: u32 = 4096;

    /// Build a record the way a registration path does: fresh 64-byte salt,
    /// verifier `g^x mod N` in the given group, enabled, no sessions granted.
    pub fn create_with_group(name: &str, password: &str, group: u32) -> Result<Self> {
        let params = groups::by_id(group).ok_or(BeamPeerError::UnknownSrpGroup(group))?;
        let salt = random_bytes(SALT_SIZE);
        let v = math::calc_v(
            name.as_bytes(),
            password.as_bytes(),
            &BigUint::from_bytes_be(&salt),
            &params.n,
            &params.g,
        );
        Ok(Self {
            name: name.to_owned(),
            group,
            salt,
            verifier: v.to_bytes_be(),
            sessions: 0,
            flags: Self::ENABLED,
        })
    }

    /// [`Self::create_with_group`] in the default group.
    pub fn create(name: &str, password: &str) -> Result<Self> {
        Self::create_with_group(name, password, Self::DEFAULT_GROUP)
    }

    pub fn is_enabled(&self) -> bool {
        self.flags & Self::ENABLED != 0
    }
}

/// Read-only username → record lookup plus the process-stable seed key that
/// feeds the decoy verifier for unknown names.
pub struct UserList {
    users: Vec<User>,
    seed_key: Zeroizing<Vec<u8>>,
}

impl UserList {
    /// A list with a freshly generated 64-byte seed key.
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users,
            seed_key: Zeroizing::new(random_bytes(SEED_KEY_SIZE)),
        }
    }

    /// A list with a caller-provided seed key (e.g. restored state, so decoy
    /// salts stay stable across restarts). The key must carry at least 256
    /// bits of entropy.
    pub fn with_seed_key(users: Vec<User>, seed_key: Vec<u8>) -> Result<Self> {
        if seed_key.len() < 32 {
            return Err(BeamPeerError::InvalidKey(format!(
                "seed key must be at least 32 bytes, got {}",
                seed_key.len()
            )));
        }
        Ok(Self {
            users,
            seed_key: Zeroizing::new(seed_key),
        })
    }

    /// Case-insensitive name lookup.
    pub fn find(&self, name: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.name.eq_ignore_ascii_case(name))
    }

    pub fn seed_key(&self) -> &[u8] {
        &self.seed_key
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }
}
