//! The outbound client persona.

use std::sync::Arc;

use proto::auth::{self, UserPayload};
use proto::auth::Profile;
use proto::bedrock::StartGame;
use proto::crypto::KeyPair;

use crate::config::ClientOptions;
use crate::error::SessionError;
use crate::session::{Session, SessionRole, SessionState};
use crate::transport::RakNetLink;

/// A fully spawned connection to a server.
pub struct Connection {
    /// The live session; use it to send packets or subscribe listeners.
    pub session: Arc<Session>,
    /// The identity the server accepted.
    pub profile: Profile,
    /// The StartGame data received during the handshake.
    pub start_game: StartGame,
}

/// Originates connections to Bedrock servers.
pub struct Client;

impl Client {
    /// Connects over an established RakNet link and drives the session
    /// through the full handshake until the player has spawned.
    pub async fn connect(link: RakNetLink, options: ClientOptions) -> anyhow::Result<Connection> {
        let session = Self::open(link, options, false)?;
        session.wait_for(SessionState::Spawned).await?;

        let profile = session
            .profile()
            .cloned()
            .ok_or_else(|| SessionError::Auth("No profile after spawn".to_owned()))?;
        let start_game = session
            .start_game()
            .cloned()
            .ok_or_else(|| SessionError::Protocol {
                packet: "StartGame",
                state: session.state(),
            })?;

        Ok(Connection { session, profile, start_game })
    }

    /// Builds the login chain and opens the session without waiting for
    /// spawn. Bridges use this with `bridge` set so the session stops
    /// handling packets after login.
    pub(crate) fn open(
        link: RakNetLink,
        options: ClientOptions,
        bridge: bool,
    ) -> anyhow::Result<Arc<Session>> {
        let keys = KeyPair::generate()?;

        let payload = options.payload.unwrap_or_else(|| {
            UserPayload::for_address(options.server_address.clone(), &options.username)
        });

        // Authentication happens before anything touches the wire; the
        // session buffers nothing while this may suspend or fail.
        let (chain, profile) = if options.offline {
            auth::create_offline(&options.username, &keys, &payload)?
        } else {
            let provider = options.provider.as_ref().ok_or_else(|| {
                SessionError::Integration("Online mode requires an identity provider".to_owned())
            })?;

            auth::create_online(provider.as_ref(), &keys, &payload)
                .map_err(|err| SessionError::Integration(format!("{err:#}")))?
        };

        let RakNetLink { addr, commands, events } = link;
        let session = Session::new(
            addr,
            commands,
            SessionRole::Client {
                chain,
                payload,
                protocol_version: options.protocol_version,
            },
            keys,
        );
        session.set_profile(profile);

        if bridge {
            session.set_bridge_mode();
        }

        session.spawn_pump(events);
        session.begin_connect()?;

        Ok(session)
    }
}
