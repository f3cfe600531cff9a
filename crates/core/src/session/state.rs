/// Which side of the connection a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Originates a connection and authenticates to a server.
    Client,
    /// Accepts a connection from a client.
    Server,
}

/// The lifecycle of a session.
///
/// States advance strictly forward; the only backwards edge is into
/// [`Disconnected`](SessionState::Disconnected), which every state can
/// reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Not connected, or torn down.
    Disconnected,
    /// The RakNet connection exists but nothing was exchanged yet.
    Connecting,
    /// Client only: RequestNetworkSettings is out, awaiting the reply.
    AwaitNetworkSettings,
    /// Network settings are agreed; awaiting (or about to send) Login.
    AwaitLogin,
    /// Login has been exchanged; awaiting the handshake counterpart.
    AwaitHandshake,
    /// Encryption is active on both directions.
    Encrypted,
    /// The server accepted the login.
    LoggedIn,
    /// StartGame has been exchanged.
    InGame,
    /// The player finished spawning; arbitrary traffic from here on.
    Spawned,
}

impl SessionState {
    /// Whether the session got past the login handshake.
    pub fn past_login(self) -> bool {
        self >= Self::LoggedIn
    }

    /// Whether the session is live.
    pub fn is_active(self) -> bool {
        self != Self::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_protocol_progress() {
        assert!(SessionState::Connecting < SessionState::AwaitLogin);
        assert!(SessionState::AwaitHandshake < SessionState::LoggedIn);
        assert!(SessionState::LoggedIn.past_login());
        assert!(SessionState::Spawned.past_login());
        assert!(!SessionState::Encrypted.past_login());
        assert!(!SessionState::Disconnected.is_active());
    }
}
