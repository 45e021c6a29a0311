use thiserror::Error;

/// Top-level error type for the BeamPeer crate.
///
/// These are internal failure conditions (malformed bytes, bad key material,
/// cipher failures). Protocol *outcomes* are [`ErrorCode`], delivered once
/// through the authenticator's finish path, and are not Rust errors.
#[derive(Debug, Error)]
pub enum BeamPeerError {
    #[error("message truncated: need {need} more byte(s) at offset {at}")]
    Truncated { need: usize, at: usize },

    #[error("unknown message tag: 0x{0:02x}")]
    UnknownMessageTag(u8),

    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("configuration changes require a stopped authenticator")]
    ConfigurationLocked,

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("unknown SRP group id: {0}")]
    UnknownSrpGroup(u32),

    #[error("AEAD encryption failed")]
    Encryption,

    #[error("AEAD decryption failed")]
    Decryption,
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, BeamPeerError>;

/// Terminal handshake outcome, reported exactly once per authenticator.
///
/// The first finish wins; later codes are discarded. `SessionDenied` (and
/// never `AccessDenied`) is what an unknown SRP user ultimately observes, so
/// no code discloses whether a username exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Normal completion.
    Success,
    /// Malformed or out-of-sequence wire data.
    ProtocolError,
    /// Anonymous identification requested while disabled.
    AccessDenied,
    /// The chosen session type is not in the permitted mask.
    SessionDenied,
    /// Internal crypto failure, configuration violation, inconsistent state.
    UnknownError,
}

impl ErrorCode {
    /// Human-readable label for logging.
    pub fn label(self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::ProtocolError => "ProtocolError",
            ErrorCode::AccessDenied => "AccessDenied",
            ErrorCode::SessionDenied => "SessionDenied",
            ErrorCode::UnknownError => "UnknownError",
        }
    }
}
