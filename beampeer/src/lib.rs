// BeamPeer — server-side authentication core for the Beam remote desktop
// peer protocol.
//
// Crate root: module declarations and public re-exports.

pub mod auth;
pub mod crypto;
pub mod error;
pub mod srp;
pub mod sysinfo;
pub mod user;

// Re-export key types at crate root for convenience.
pub use auth::server::ServerAuthenticator;
pub use auth::{AnonymousAccess, Delegate, State};
pub use error::{BeamPeerError, ErrorCode, Result};
pub use user::{User, UserList};
