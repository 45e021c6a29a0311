//! Server-side authenticator state machine.
//!
//! Drives the fixed handshake sequence over an unreliable-in-content but
//! ordered transport: negotiates the AEAD suite and an optional X25519
//! pre-key from the client hello, authenticates the peer via SRP-6a (or
//! admits an anonymous one), derives the session key, and settles on a
//! single session type. The transport calls `on_received` with each inbound
//! frame and `on_written` after each outbound frame completes; the machine
//! never blocks inside a handler.
//!
//! A username without a usable record is answered with a decoy SRP exchange
//! derived from the list's seed key, so the wire traffic is shaped exactly
//! like a real user's. The decoy peer only fails at the final session-type
//! check, which reports `SessionDenied` the same way a real user with no
//! granted sessions would.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::auth::messages::{
    Identify, Message, PeerFacts, ServerHello, SessionChallenge, SrpServerKeyExchange, Version,
};
use crate::auth::{AnonymousAccess, Delegate, State};
use crate::crypto::aead::{aes_hw_accelerated, Encryption, MessageDecryptor, MessageEncryptor};
use crate::crypto::hash::{blake2b512, blake2s256};
use crate::crypto::keypair::KeyPair;
use crate::crypto::random::{random_bytes, random_iv};
use crate::error::{BeamPeerError, ErrorCode, Result};
use crate::srp::{groups, math};
use crate::sysinfo::{self, OsType};
use crate::user::UserList;

/// Server ephemeral `b` size: 128 bytes, 1024 bits.
const EPHEMERAL_B_SIZE: usize = 128;

/// Position in the fixed wire sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InternalState {
    ReadClientHello,
    SendServerHello,
    ReadIdentify,
    SendServerKeyExchange,
    ReadClientKeyExchange,
    SendSessionChallenge,
    ReadSessionResponse,
    Done,
}

/// SRP working set, alive from identify until finish.
struct SrpExchange {
    n: BigUint,
    g: BigUint,
    v: BigUint,
    b: BigUint,
    b_pub: BigUint,
}

/// The server half of the Beam authentication handshake.
///
/// Configure with the setters while stopped, call [`start`](Self::start),
/// then feed it transport events. Outcome and negotiated parameters are
/// readable once [`error_code`](Self::error_code) is set.
pub struct ServerAuthenticator {
    state: State,
    internal_state: InternalState,
    result: Option<ErrorCode>,

    // Configuration, immutable once started.
    user_list: Arc<UserList>,
    key_pair: Option<KeyPair>,
    anonymous_access: AnonymousAccess,
    aes_hw: bool,

    // Handshake-local state.
    session_types: u32,
    identify: Option<Identify>,
    encryption: Option<Encryption>,
    encrypt_iv: Vec<u8>,
    decrypt_iv: Vec<u8>,
    session_key: Zeroizing<Vec<u8>>,
    srp: Option<SrpExchange>,
    user_name: String,
    session_type: u32,
    peer: PeerFacts,
}

impl ServerAuthenticator {
    pub fn new(user_list: Arc<UserList>) -> Self {
        Self {
            state: State::Stopped,
            internal_state: InternalState::ReadClientHello,
            result: None,
            user_list,
            key_pair: None,
            anonymous_access: AnonymousAccess::Disable,
            aes_hw: aes_hw_accelerated(),
            session_types: 0,
            identify: None,
            encryption: None,
            encrypt_iv: Vec::new(),
            decrypt_iv: Vec::new(),
            session_key: Zeroizing::new(Vec::new()),
            srp: None,
            user_name: String::new(),
            session_type: 0,
            peer: PeerFacts::default(),
        }
    }

    // ── Configuration (stopped state only) ───────────────────────────────

    /// Install the server's X25519 private key and pre-generate the IV the
    /// pre-key exchange will answer with.
    pub fn set_private_key(&mut self, private_key: &[u8]) -> Result<()> {
        if self.state != State::Stopped {
            return Err(BeamPeerError::ConfigurationLocked);
        }
        let key_pair = KeyPair::from_private_key(private_key)?;
        self.encrypt_iv = random_iv();
        self.key_pair = Some(key_pair);
        Ok(())
    }

    /// Set the anonymous-access policy. Enabling requires an installed
    /// private key and a nonzero session mask; disabling clears the mask.
    pub fn set_anonymous_access(
        &mut self,
        access: AnonymousAccess,
        session_types: u32,
    ) -> Result<()> {
        if self.state != State::Stopped {
            return Err(BeamPeerError::ConfigurationLocked);
        }
        match access {
            AnonymousAccess::Enable => {
                if self.key_pair.is_none() {
                    return Err(BeamPeerError::InvalidConfig(
                        "anonymous access requires an installed private key",
                    ));
                }
                if session_types == 0 {
                    return Err(BeamPeerError::InvalidConfig(
                        "anonymous access requires at least one permitted session type",
                    ));
                }
                self.session_types = session_types;
            }
            AnonymousAccess::Disable => {
                self.session_types = 0;
            }
        }
        self.anonymous_access = access;
        Ok(())
    }

    // ── Pump ─────────────────────────────────────────────────────────────

    /// Begin the handshake. Configuration invariants are enforced here once;
    /// a violation finishes immediately with `UnknownError`.
    pub fn start(&mut self) {
        if self.state != State::Stopped {
            return;
        }
        self.state = State::Pending;
        self.internal_state = InternalState::ReadClientHello;

        let config_ok = match self.anonymous_access {
            AnonymousAccess::Enable => self.key_pair.is_some() && self.session_types != 0,
            AnonymousAccess::Disable => self.session_types == 0,
        };
        if !config_ok {
            self.finish(ErrorCode::UnknownError);
        }
    }

    /// One inbound frame from the transport.
    pub fn on_received<D: Delegate>(&mut self, delegate: &mut D, buffer: &[u8]) {
        if self.state != State::Pending {
            return;
        }
        match self.internal_state {
            InternalState::ReadClientHello => self.on_client_hello(delegate, buffer),
            InternalState::ReadIdentify => self.on_identify(delegate, buffer),
            InternalState::ReadClientKeyExchange => self.on_client_key_exchange(delegate, buffer),
            InternalState::ReadSessionResponse => self.on_session_response(buffer),
            state => {
                warn!(state = ?state, "frame received outside a read state");
                self.finish(ErrorCode::UnknownError);
            }
        }
    }

    /// The transport finished writing the last queued message.
    pub fn on_written<D: Delegate>(&mut self, delegate: &mut D) {
        if self.state != State::Pending {
            return;
        }
        match self.internal_state {
            InternalState::SendServerHello => {
                debug!("sent: ServerHello");
                if !self.session_key.is_empty()
                    && !delegate.on_session_key_changed(&self.session_key)
                {
                    return;
                }
                match self.identify {
                    Some(Identify::Srp) => {
                        self.internal_state = InternalState::ReadIdentify;
                    }
                    Some(Identify::Anonymous) => {
                        self.internal_state = InternalState::SendSessionChallenge;
                        self.send_session_challenge(delegate);
                    }
                    None => self.finish(ErrorCode::UnknownError),
                }
            }
            InternalState::SendServerKeyExchange => {
                debug!("sent: ServerKeyExchange");
                self.internal_state = InternalState::ReadClientKeyExchange;
            }
            InternalState::SendSessionChallenge => {
                debug!("sent: SessionChallenge");
                self.internal_state = InternalState::ReadSessionResponse;
            }
            state => {
                warn!(state = ?state, "write completion outside a send state");
                self.finish(ErrorCode::UnknownError);
            }
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────

    fn on_client_hello<D: Delegate>(&mut self, delegate: &mut D, buffer: &[u8]) {
        debug!("received: ClientHello");

        let hello = match Message::decode(buffer) {
            Ok(Message::ClientHello(m)) => m,
            _ => return self.finish(ErrorCode::ProtocolError),
        };

        if !Encryption::any_supported(hello.encryption) {
            // No overlap in cipher offerings.
            return self.finish(ErrorCode::ProtocolError);
        }

        let identify = match Identify::from_wire(hello.identify) {
            Some(identify) => identify,
            None => return self.finish(ErrorCode::ProtocolError),
        };
        if identify == Identify::Anonymous && self.anonymous_access != AnonymousAccess::Enable {
            return self.finish(ErrorCode::AccessDenied);
        }
        self.identify = Some(identify);

        let mut reply_iv = Vec::new();
        if let Some(key_pair) = &self.key_pair {
            // The ECDH envelope is all-or-nothing.
            if hello.public_key.is_empty() != hello.iv.is_empty() {
                return self.finish(ErrorCode::ProtocolError);
            }
            if !hello.public_key.is_empty() {
                let shared = match key_pair.session_key(&hello.public_key) {
                    Some(shared) => shared,
                    None => return self.finish(ErrorCode::UnknownError),
                };
                self.session_key = Zeroizing::new(blake2s256(&[&shared]).to_vec());
                self.decrypt_iv = hello.iv;
                reply_iv = self.encrypt_iv.clone();
            }
        }

        let encryption = Encryption::select(hello.encryption, self.aes_hw);
        info!(encryption = ?encryption, identify = ?identify, "negotiated");
        self.encryption = Some(encryption);

        self.internal_state = InternalState::SendServerHello;
        self.send(
            delegate,
            Message::ServerHello(ServerHello {
                encryption: encryption.bit(),
                iv: reply_iv,
            }),
        );
    }

    fn on_identify<D: Delegate>(&mut self, delegate: &mut D, buffer: &[u8]) {
        debug!("received: Identify");

        let identify = match Message::decode(buffer) {
            Ok(Message::SrpIdentify(m)) => m,
            _ => return self.finish(ErrorCode::ProtocolError),
        };
        if identify.username.is_empty() {
            return self.finish(ErrorCode::ProtocolError);
        }
        debug!(username = %identify.username, "identify");
        self.user_name = identify.username.clone();

        let username = identify.username.as_bytes();
        let usable = self.user_list.find(&identify.username).and_then(|user| {
            groups::by_id(user.group)
                .filter(|_| user.is_enabled())
                .map(|group| (user, group))
        });

        let exchange = match usable {
            Some((user, group)) => {
                self.session_types = user.sessions;
                let s = BigUint::from_bytes_be(&user.salt);
                let v = BigUint::from_bytes_be(&user.verifier);
                (group, s, v)
            }
            None => {
                // Decoy: deterministic (s, v) from the seed key, an empty
                // session mask, and the largest group. Same message shape,
                // same math, same cost as a real record.
                self.session_types = 0;
                let group = groups::decoy_group();
                let s = BigUint::from_bytes_be(&blake2b512(&[
                    self.user_list.seed_key(),
                    username,
                ]));
                let v = math::calc_v(username, self.user_list.seed_key(), &s, &group.n, &group.g);
                (group, s, v)
            }
        };
        let (group, s, v) = exchange;

        let b = BigUint::from_bytes_be(&random_bytes(EPHEMERAL_B_SIZE));
        let b_pub = math::calc_b_pub(&b, &group.n, &group.g, &v);

        // N and g come from the fixed group table; the salt and public
        // ephemeral are the values that can degenerate.
        if s.is_zero() || b_pub.is_zero() {
            return self.finish(ErrorCode::ProtocolError);
        }

        self.encrypt_iv = random_iv();
        let key_exchange = SrpServerKeyExchange {
            number: group.n.to_bytes_be(),
            generator: group.g.to_bytes_be(),
            salt: s.to_bytes_be(),
            b: b_pub.to_bytes_be(),
            iv: self.encrypt_iv.clone(),
        };
        self.srp = Some(SrpExchange {
            n: group.n.clone(),
            g: group.g.clone(),
            v,
            b,
            b_pub,
        });

        self.internal_state = InternalState::SendServerKeyExchange;
        self.send(delegate, Message::SrpServerKeyExchange(key_exchange));
    }

    fn on_client_key_exchange<D: Delegate>(&mut self, delegate: &mut D, buffer: &[u8]) {
        debug!("received: ClientKeyExchange");

        let key_exchange = match Message::decode(buffer) {
            Ok(Message::SrpClientKeyExchange(m)) => m,
            _ => return self.finish(ErrorCode::ProtocolError),
        };
        if key_exchange.a.is_empty() || key_exchange.iv.is_empty() {
            return self.finish(ErrorCode::ProtocolError);
        }
        self.decrypt_iv = key_exchange.iv;

        let srp_key = match self.create_srp_key(&key_exchange.a) {
            Some(key) => key,
            None => return self.finish(ErrorCode::UnknownError),
        };

        // Both suites take a 256-bit key; the mix binds the SRP secret to
        // the ECDH-derived key when one exists.
        match self.encryption {
            Some(Encryption::Aes256Gcm) | Some(Encryption::ChaCha20Poly1305) => {
                let mixed = blake2s256(&[&self.session_key, &srp_key]);
                self.session_key = Zeroizing::new(mixed.to_vec());
            }
            None => return self.finish(ErrorCode::UnknownError),
        }

        if !delegate.on_session_key_changed(&self.session_key) {
            return;
        }

        self.internal_state = InternalState::SendSessionChallenge;
        self.send_session_challenge(delegate);
    }

    fn create_srp_key(&self, a_bytes: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        let srp = self.srp.as_ref()?;
        let a_pub = BigUint::from_bytes_be(a_bytes);
        if !math::verify_a_mod_n(&a_pub, &srp.n) {
            warn!("client public ephemeral is a multiple of N");
            return None;
        }
        let u = math::calc_u(&a_pub, &srp.b_pub, &srp.n);
        let server_key = math::calc_server_key(&a_pub, &srp.v, &u, &srp.b, &srp.n);
        Some(Zeroizing::new(server_key.to_bytes_be()))
    }

    fn send_session_challenge<D: Delegate>(&mut self, delegate: &mut D) {
        let challenge = SessionChallenge {
            session_types: self.session_types,
            facts: PeerFacts {
                version: Version::current(),
                os_type: OsType::current() as u32,
                computer_name: sysinfo::computer_name(),
                cpu_cores: sysinfo::cpu_cores(),
            },
        };
        self.send(delegate, Message::SessionChallenge(challenge));
    }

    fn on_session_response(&mut self, buffer: &[u8]) {
        debug!("received: SessionResponse");

        let response = match Message::decode(buffer) {
            Ok(Message::SessionResponse(m)) => m,
            _ => return self.finish(ErrorCode::ProtocolError),
        };
        self.peer = response.facts;
        debug!(
            version = %self.peer.version,
            os = %OsType::from_wire(self.peer.os_type).label(),
            computer_name = %self.peer.computer_name,
            cpu_cores = self.peer.cpu_cores,
            session_type = response.session_type,
            "peer facts"
        );

        let mask = response.session_type;
        if mask.count_ones() != 1 {
            return self.finish(ErrorCode::ProtocolError);
        }
        if self.session_types & mask == 0 {
            return self.finish(ErrorCode::SessionDenied);
        }
        self.session_type = mask.trailing_zeros();

        self.finish(ErrorCode::Success);
    }

    fn send<D: Delegate>(&mut self, delegate: &mut D, message: Message) {
        debug!(message = message.name(), "sending");
        delegate.send_message(message.encode());
    }

    /// Record the terminal result. First call wins; the SRP working set is
    /// dropped and, on failure, the session key wiped.
    fn finish(&mut self, code: ErrorCode) {
        if self.result.is_some() {
            return;
        }
        info!(code = code.label(), "authenticator finished");
        self.result = Some(code);
        self.state = State::Done;
        self.internal_state = InternalState::Done;
        self.srp = None;
        if code != ErrorCode::Success {
            self.session_key.zeroize();
        }
    }

    // ── Results ──────────────────────────────────────────────────────────

    pub fn state(&self) -> State {
        self.state
    }

    /// The terminal code, once finished.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.result
    }

    pub fn encryption(&self) -> Option<Encryption> {
        self.encryption
    }

    /// Bit index of the session type the client chose.
    pub fn session_type(&self) -> u32 {
        self.session_type
    }

    /// Effective permitted mask for this peer.
    pub fn session_types(&self) -> u32 {
        self.session_types
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn identify(&self) -> Option<Identify> {
        self.identify
    }

    pub fn peer_version(&self) -> Version {
        self.peer.version
    }

    pub fn peer_os_type(&self) -> OsType {
        OsType::from_wire(self.peer.os_type)
    }

    pub fn peer_computer_name(&self) -> &str {
        &self.peer.computer_name
    }

    pub fn peer_cpu_cores(&self) -> u32 {
        self.peer.cpu_cores
    }

    /// Server→client nonce for the transport's AEAD layer.
    pub fn encrypt_iv(&self) -> &[u8] {
        &self.encrypt_iv
    }

    /// Client→server nonce for the transport's AEAD layer.
    pub fn decrypt_iv(&self) -> &[u8] {
        &self.decrypt_iv
    }

    pub fn session_key(&self) -> &[u8] {
        &self.session_key
    }

    /// Move the derived session key out; the authenticator keeps nothing.
    pub fn take_session_key(&mut self) -> Zeroizing<Vec<u8>> {
        std::mem::take(&mut self.session_key)
    }

    /// Server→client message cipher over the negotiated parameters.
    pub fn create_encryptor(&self) -> Result<MessageEncryptor> {
        let (suite, key) = self.transport_params()?;
        MessageEncryptor::new(suite, &key, &self.encrypt_iv)
    }

    /// Client→server message cipher over the negotiated parameters.
    pub fn create_decryptor(&self) -> Result<MessageDecryptor> {
        let (suite, key) = self.transport_params()?;
        MessageDecryptor::new(suite, &key, &self.decrypt_iv)
    }

    fn transport_params(&self) -> Result<(Encryption, [u8; 32])> {
        if self.result != Some(ErrorCode::Success) {
            return Err(BeamPeerError::InvalidKey(
                "handshake has not completed successfully".into(),
            ));
        }
        let suite = self
            .encryption
            .ok_or_else(|| BeamPeerError::InvalidKey("no negotiated cipher".into()))?;
        let key: [u8; 32] = self.session_key.as_slice().try_into().map_err(|_| {
            BeamPeerError::InvalidKey(format!(
                "session key must be 32 bytes, got {}",
                self.session_key.len()
            ))
        })?;
        Ok((suite, key))
    }
}

