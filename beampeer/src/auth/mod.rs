// Peer authentication: wire records and the server-side state machine.

pub mod messages;
pub mod server;

/// Outer lifecycle of an authenticator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Configurable; no handshake running.
    Stopped,
    /// Handshake in progress.
    Pending,
    /// Finished; the result code is set and further input is discarded.
    Done,
}

impl State {
    /// Human-readable label for the current state (used in log lines).
    pub fn label(self) -> &'static str {
        match self {
            State::Stopped => "Stopped",
            State::Pending => "Pending",
            State::Done => "Done",
        }
    }
}

/// Anonymous-access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousAccess {
    Disable,
    Enable,
}

/// Transport-side collaborator driving an authenticator.
///
/// `send_message` must not block; the transport reports completion by
/// calling the authenticator's `on_written`. Inbound frames arrive through
/// `on_received`.
pub trait Delegate {
    /// Queue one encoded handshake message for transmission.
    fn send_message(&mut self, frame: Vec<u8>);

    /// Called after each mutation of the session key. Returning `false`
    /// aborts the handshake: the authenticator sends nothing further.
    fn on_session_key_changed(&mut self, session_key: &[u8]) -> bool {
        let _ = session_key;
        true
    }
}
