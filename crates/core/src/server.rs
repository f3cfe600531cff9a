//! The inbound server persona.

use std::sync::Arc;

use proto::crypto::KeyPair;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::session::{Session, SessionRole, SessionState};
use crate::transport::RakNetLink;

/// Lifecycle notifications emitted by a running server.
pub enum ServerEvent {
    /// A client completed its login handshake.
    PlayerConnect(Arc<Session>),
    /// A previously connected client went away.
    PlayerDisconnect(String, Arc<Session>),
}

/// Accepts RakNet connections and wraps each in a server-role session.
pub struct Server;

impl Server {
    /// Starts the accept loop over a channel of established RakNet
    /// connections and returns the event stream.
    pub fn start(
        config: ServerConfig,
        mut connections: mpsc::Receiver<RakNetLink>,
    ) -> mpsc::Receiver<ServerEvent> {
        let (events_tx, events_rx) = mpsc::channel(32);

        tokio::spawn(async move {
            while let Some(link) = connections.recv().await {
                match Self::accept(config.clone(), link) {
                    Ok(session) => {
                        Self::watch_session(session, events_tx.clone());
                    }
                    Err(err) => {
                        tracing::error!("Failed to accept connection | {err:#}");
                    }
                }
            }
        });

        events_rx
    }

    /// Wraps one established connection in a session.
    pub fn accept(config: ServerConfig, link: RakNetLink) -> anyhow::Result<Arc<Session>> {
        Self::accept_with(config, link, false)
    }

    pub(crate) fn accept_with(
        config: ServerConfig,
        link: RakNetLink,
        bridge: bool,
    ) -> anyhow::Result<Arc<Session>> {
        let keys = KeyPair::generate()?;

        let RakNetLink { addr, commands, events } = link;
        let session = Session::new(addr, commands, SessionRole::Server { config }, keys);

        if bridge {
            session.set_bridge_mode();
        }

        session.spawn_pump(events);
        Ok(session)
    }

    fn watch_session(session: Arc<Session>, events: mpsc::Sender<ServerEvent>) {
        tokio::spawn(async move {
            if session.wait_for(SessionState::LoggedIn).await.is_err() {
                // Never made it through login; nothing to announce.
                return;
            }

            if events.send(ServerEvent::PlayerConnect(session.clone())).await.is_err() {
                return;
            }

            let mut receiver = session.subscribe_state();
            loop {
                if *receiver.borrow_and_update() == SessionState::Disconnected {
                    break;
                }
                if receiver.changed().await.is_err() {
                    break;
                }
            }

            let name = session.profile().map(|profile| profile.name.clone()).unwrap_or_default();
            let _ = events.send(ServerEvent::PlayerDisconnect(name, session)).await;
        });
    }
}
