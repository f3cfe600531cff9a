use thiserror::Error;

use crate::session::SessionState;

/// The failure classes of a session.
///
/// Decode failures are the only recoverable class: they are logged and
/// the offending packet is dropped. Everything else tears the session
/// down, with or without a Disconnect packet depending on whether the
/// stream state is still trustworthy.
#[derive(Debug, Error)]
pub enum SessionError {
    /// RakNet-level failure: connect, timeout, closed socket.
    /// Fatal, no Disconnect packet is sent.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Malformed frame or packet body. Per-packet; the session continues.
    #[error("malformed packet: {0}")]
    Decode(String),

    /// A packet arrived in a state that does not allow it.
    /// Fatal; the peer is told with a Disconnect.
    #[error("{packet} is not allowed in state {state:?}")]
    Protocol { packet: &'static str, state: SessionState },

    /// JWT verification failed, or the chain was rejected.
    /// Fatal; the peer is told with a Disconnect.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Checksum mismatch, counter desync or key derivation failure.
    /// Fatal; the session closes without a Disconnect because the
    /// stream state is ambiguous.
    #[error("encryption failure: {0}")]
    Encryption(String),

    /// The external identity provider failed. Surfaced to the caller of
    /// `connect()` before RakNet is opened.
    #[error("identity provider failure: {0}")]
    Integration(String),
}
