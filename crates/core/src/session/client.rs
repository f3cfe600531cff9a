//! Client-side packet handlers: drive the handshake towards a server.

use proto::bedrock::{
    ChunkRadiusUpdated, ClientToServerHandshake, Disconnect, Header, LoadingScreenType, Login,
    NetworkSettings, PlayStatus, RequestChunkRadius, ResourcePackClientResponse,
    ResourcePackStack, ResourcePacksInfo, ResponseStatus, ServerToClientHandshake,
    ServerboundLoadingScreen, SetLocalPlayerAsInitialized, StartGame, Status,
    DISCONNECTED_BAD_PACKET,
};
use proto::compress::Compression;
use proto::crypto::{derive_key, jwt, keys, Encryptor};
use proto::bedrock::ConnectedPacket;
use util::Deserialize;

use crate::error::SessionError;
use crate::session::{Session, SessionRole, SessionState};

impl Session {
    pub(crate) fn handle_clientbound(
        &self,
        header: Header,
        body: &[u8],
        _frame: &[u8],
    ) -> anyhow::Result<()> {
        match header.id {
            NetworkSettings::ID => self.handle_network_settings(body),
            ServerToClientHandshake::ID => self.handle_server_handshake(body),
            PlayStatus::ID => self.handle_play_status(body),
            ResourcePacksInfo::ID => self.handle_resource_packs_info(body),
            ResourcePackStack::ID => self.handle_resource_pack_stack(body),
            StartGame::ID => self.handle_start_game(body),
            ChunkRadiusUpdated::ID => Ok(()),
            Disconnect::ID => self.handle_peer_disconnect(body),
            _ => Ok(()),
        }
    }

    /// Handles a [`NetworkSettings`] packet: compression is configured
    /// and the login chain goes out.
    fn handle_network_settings(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::AwaitNetworkSettings, "NetworkSettings")?;
        let settings: NetworkSettings = self.decode_strict(body, DISCONNECTED_BAD_PACKET)?;

        self.set_compression(Compression {
            algorithm: settings.compression_algorithm,
            threshold: settings.compression_threshold,
        });

        let SessionRole::Client { chain, protocol_version, .. } = &self.role else {
            unreachable!("client handler on a server session");
        };

        self.send(Login {
            protocol_version: *protocol_version,
            identity_chain: chain.identity.clone(),
            user_token: chain.user.clone(),
        })?;
        self.set_state(SessionState::AwaitHandshake);

        Ok(())
    }

    /// Handles a [`ServerToClientHandshake`]: the shared secret is
    /// derived and the reply is the first encrypted packet.
    fn handle_server_handshake(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::AwaitHandshake, "ServerToClientHandshake")?;
        let handshake: ServerToClientHandshake =
            self.decode_strict(body, DISCONNECTED_BAD_PACKET)?;

        let token = jwt::decode_handshake_token(&handshake.jwt)
            .map_err(|err| SessionError::Auth(format!("{err:#}")))?;
        let server_key = keys::public_key_from_x5u(&token.server_x5u)
            .map_err(|err| SessionError::Auth(format!("{err:#}")))?;

        let shared_secret = self.keys().shared_secret(&server_key);
        let key = derive_key(&token.salt, &shared_secret);

        // Everything queued so far must leave unencrypted.
        self.flush()?;
        self.install_encryptor(Encryptor::new(key));

        self.send(ClientToServerHandshake)?;
        self.set_state(SessionState::Encrypted);

        Ok(())
    }

    fn handle_play_status(&self, body: &[u8]) -> anyhow::Result<()> {
        let status: PlayStatus = self.decode_strict(body, DISCONNECTED_BAD_PACKET)?;

        match status.status {
            Status::LoginSuccess => {
                self.expect_state(SessionState::Encrypted, "PlayStatus(LoginSuccess)")?;
                self.set_state(SessionState::LoggedIn);
                Ok(())
            }
            Status::PlayerSpawn => {
                self.expect_state(SessionState::InGame, "PlayStatus(PlayerSpawn)")?;

                let runtime_id =
                    self.start_game().map(|start_game| start_game.runtime_id).unwrap_or_default();
                self.queue(SetLocalPlayerAsInitialized { runtime_id })?;
                self.queue(ServerboundLoadingScreen {
                    screen_type: LoadingScreenType::EndLoadingScreen,
                    screen_id: None,
                })?;
                self.flush()?;

                self.set_state(SessionState::Spawned);
                Ok(())
            }
            failure => {
                self.set_disconnect_reason(format!("{failure:?}"));
                self.close();
                Err(SessionError::Auth(format!("Server refused the login: {failure:?}")).into())
            }
        }
    }

    /// Handles a [`ResourcePacksInfo`] packet by claiming to have every
    /// pack already.
    fn handle_resource_packs_info(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::LoggedIn, "ResourcePacksInfo")?;
        let Some(_info) = self.decode_lenient::<ResourcePacksInfo>(body, "ResourcePacksInfo")
        else {
            return Ok(());
        };

        self.send(ResourcePackClientResponse {
            status: ResponseStatus::HaveAllPacks,
            pack_ids: Vec::new(),
        })
    }

    /// Handles a [`ResourcePackStack`] packet by completing negotiation.
    fn handle_resource_pack_stack(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::LoggedIn, "ResourcePackStack")?;
        let Some(_stack) = self.decode_lenient::<ResourcePackStack>(body, "ResourcePackStack")
        else {
            return Ok(());
        };

        self.send(ResourcePackClientResponse {
            status: ResponseStatus::Completed,
            pack_ids: Vec::new(),
        })
    }

    /// Handles a [`StartGame`] packet and requests chunks around spawn.
    fn handle_start_game(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::LoggedIn, "StartGame")?;
        let Some(start_game) = self.decode_lenient::<StartGame>(body, "StartGame") else {
            return Ok(());
        };

        self.set_start_game(start_game);

        let SessionRole::Client { payload, .. } = &self.role else {
            unreachable!("client handler on a server session");
        };
        let radius = payload.max_view_distance.max(1) as i32;

        self.send(RequestChunkRadius { radius, max_radius: radius as u8 })?;
        self.set_state(SessionState::InGame);

        Ok(())
    }

    pub(crate) fn handle_peer_disconnect(&self, body: &[u8]) -> anyhow::Result<()> {
        if let Some(disconnect) = self.decode_lenient::<Disconnect>(body, "Disconnect") {
            tracing::debug!("[{}] Peer disconnected: {}", self.addr(), disconnect.message);
            self.set_disconnect_reason(disconnect.message);
        }

        self.close();
        Ok(())
    }

    /// Decodes a packet body, logging and dropping it on failure as
    /// decode errors are never fatal outside the handshake.
    pub(crate) fn decode_lenient<'a, T: Deserialize<'a>>(
        &self,
        body: &'a [u8],
        name: &str,
    ) -> Option<T> {
        match T::deserialize(body) {
            Ok(packet) => Some(packet),
            Err(err) => {
                tracing::warn!("[{}] Dropped malformed {name} packet | {err:#}", self.addr());
                None
            }
        }
    }
}
