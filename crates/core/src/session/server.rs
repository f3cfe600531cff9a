//! Server-side packet handlers: accept a client through the handshake.

use proto::auth::{Profile, UserPayload};
use proto::bedrock::{
    ChunkRadiusUpdated, ClientCacheStatus, ClientToServerHandshake, ConnectedPacket, Disconnect,
    Header, Login, NetworkSettings, PlayStatus, RequestChunkRadius, RequestNetworkSettings,
    ResourcePackClientResponse, ResourcePackStack, ResourcePacksInfo, ResponseStatus,
    ServerToClientHandshake, ServerboundLoadingScreen, SetLocalPlayerAsInitialized, StartGame,
    Status, CLIENT_VERSION_STRING, DISCONNECTED_BAD_PACKET, DISCONNECTED_LOGIN_FAILED,
    DISCONNECTED_VERSION_MISMATCH, NETWORK_VERSION,
};
use proto::compress::Compression;
use proto::crypto::{derive_key, jwt, keys, Encryptor, KEY_SALT};
use util::Deserialize;

use crate::error::SessionError;
use crate::session::{Session, SessionState};

impl Session {
    pub(crate) fn handle_serverbound(
        &self,
        header: Header,
        body: &[u8],
        _frame: &[u8],
    ) -> anyhow::Result<()> {
        match header.id {
            RequestNetworkSettings::ID => self.handle_network_settings_request(body),
            Login::ID => self.handle_login(body),
            ClientToServerHandshake::ID => self.handle_client_handshake(body),
            ClientCacheStatus::ID => self.handle_cache_status(body),
            ResourcePackClientResponse::ID => self.handle_pack_response(body),
            RequestChunkRadius::ID => self.handle_chunk_radius_request(body),
            SetLocalPlayerAsInitialized::ID => self.handle_local_initialized(body),
            ServerboundLoadingScreen::ID => Ok(()),
            Disconnect::ID => self.handle_peer_disconnect(body),
            _ => Ok(()),
        }
    }

    /// Handles a [`RequestNetworkSettings`] packet.
    ///
    /// Compression is enabled for everything after the reply.
    fn handle_network_settings_request(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::Connecting, "RequestNetworkSettings")?;
        let request: RequestNetworkSettings = self.decode_strict(body, DISCONNECTED_BAD_PACKET)?;

        if request.protocol_version != NETWORK_VERSION {
            if request.protocol_version > NETWORK_VERSION {
                self.send(PlayStatus { status: Status::FailedServer })?;

                anyhow::bail!(
                    "Client is using a newer protocol ({} vs. {})",
                    request.protocol_version,
                    NETWORK_VERSION
                );
            } else {
                self.send(PlayStatus { status: Status::FailedClient })?;

                anyhow::bail!(
                    "Client is using an older protocol ({} vs. {})",
                    request.protocol_version,
                    NETWORK_VERSION
                );
            }
        }

        let config = self.server_config();
        self.send(NetworkSettings {
            compression_threshold: config.compression_threshold,
            compression_algorithm: config.compression_algorithm,
            client_throttle: config.client_throttle,
        })?;

        self.set_compression(Compression {
            algorithm: config.compression_algorithm,
            threshold: config.compression_threshold,
        });
        self.set_state(SessionState::AwaitLogin);

        Ok(())
    }

    /// Handles a [`Login`] packet: the identity chain and user token are
    /// verified, the shared secret is derived and encryption is armed
    /// right after the handshake token goes out.
    fn handle_login(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::AwaitLogin, "Login")?;

        let request = match Login::deserialize(body) {
            Ok(request) => request,
            Err(err) => {
                let _ = self.kick(DISCONNECTED_LOGIN_FAILED);
                return Err(err);
            }
        };

        let verified = match jwt::verify_chain(&request.identity_chain) {
            Ok(verified) => verified,
            Err(err) => {
                let _ = self.kick(DISCONNECTED_VERSION_MISMATCH);
                return Err(SessionError::Auth(format!("{err:#}")).into());
            }
        };

        let config = self.server_config();
        if config.require_xbox_auth && !verified.verified {
            let _ = self.kick(DISCONNECTED_VERSION_MISMATCH);
            return Err(SessionError::Auth("Identity chain is not signed by Mojang".into()).into());
        }

        let payload = match jwt::verify_user_token::<UserPayload>(
            &request.user_token,
            &verified.identity.public_key,
        ) {
            Ok(payload) => payload,
            Err(err) => {
                let _ = self.kick(DISCONNECTED_VERSION_MISMATCH);
                return Err(SessionError::Auth(format!("{err:#}")).into());
            }
        };

        if let Some(advertised) = &config.advertised_address {
            if &payload.server_address != advertised {
                let _ = self.kick(DISCONNECTED_VERSION_MISMATCH);
                return Err(SessionError::Auth(format!(
                    "ServerAddress {} does not match the advertised address",
                    payload.server_address
                ))
                .into());
            }
        }

        tracing::debug!("[{}] Identity verified as {}", self.addr(), verified.identity.name);

        let client_key = keys::public_key_from_x5u(&verified.identity.public_key)
            .map_err(|err| SessionError::Encryption(format!("{err:#}")))?;
        let shared_secret = self.keys().shared_secret(&client_key);
        let key = derive_key(KEY_SALT, &shared_secret);

        let jwt = jwt::sign_handshake_token(self.keys(), KEY_SALT)
            .map_err(|err| SessionError::Encryption(format!("{err:#}")))?;

        self.set_profile(Profile {
            name: verified.identity.name.clone(),
            uuid: verified.identity.uuid,
            xuid: verified.identity.xuid,
        });
        self.set_identity(verified.identity);
        self.set_user_payload(payload);

        // Flush before enabling encryption; the handshake itself must
        // leave in plaintext.
        self.flush()?;
        self.send(ServerToClientHandshake { jwt })?;
        self.install_encryptor(Encryptor::new(key));
        self.set_state(SessionState::AwaitHandshake);

        Ok(())
    }

    /// Handles a [`ClientToServerHandshake`]. The client can encrypt;
    /// login is complete.
    fn handle_client_handshake(&self, body: &[u8]) -> anyhow::Result<()> {
        eprintln!("DEBUG handle_client_handshake called, body len {}", body.len());
        self.expect_state(SessionState::AwaitHandshake, "ClientToServerHandshake")?;
        let _: ClientToServerHandshake = self.decode_strict(body, DISCONNECTED_BAD_PACKET)?;

        self.set_state(SessionState::LoggedIn);

        self.queue(PlayStatus { status: Status::LoginSuccess })?;
        if !self.is_bridge_mode() {
            // A bridge lets the real server run pack negotiation.
            self.queue(ResourcePacksInfo::default())?;
        }
        self.flush()?;

        Ok(())
    }

    /// Handles a [`ClientCacheStatus`] packet.
    fn handle_cache_status(&self, body: &[u8]) -> anyhow::Result<()> {
        let Some(request) = self.decode_lenient::<ClientCacheStatus>(body, "ClientCacheStatus")
        else {
            return Ok(());
        };

        tracing::debug!("[{}] Blob cache enabled: {}", self.addr(), request.enabled);
        self.set_cache_status(request.enabled);
        Ok(())
    }

    fn handle_pack_response(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::LoggedIn, "ResourcePackClientResponse")?;
        let Some(response) =
            self.decode_lenient::<ResourcePackClientResponse>(body, "ResourcePackClientResponse")
        else {
            return Ok(());
        };

        match response.status {
            ResponseStatus::HaveAllPacks => self.send(ResourcePackStack {
                forced_to_accept: false,
                resource_packs: Vec::new(),
                behavior_packs: Vec::new(),
                game_version: CLIENT_VERSION_STRING.to_owned(),
                experiments_previously_toggled: false,
            }),
            ResponseStatus::Completed => {
                self.send(StartGame {
                    entity_id: 1,
                    runtime_id: 1,
                    game_mode: 1,
                    position: [0.0, 60.0, 0.0],
                    rotation: [0.0, 0.0],
                    rest: Vec::new(),
                })?;
                self.set_state(SessionState::InGame);
                Ok(())
            }
            ResponseStatus::Refused => self.kick("Resource packs refused"),
            other => {
                tracing::debug!("[{}] Ignoring pack response {other:?}", self.addr());
                Ok(())
            }
        }
    }

    /// Handles a [`RequestChunkRadius`] packet by granting the capped
    /// render distance and spawning the player.
    fn handle_chunk_radius_request(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::InGame, "RequestChunkRadius")?;
        let Some(request) = self.decode_lenient::<RequestChunkRadius>(body, "RequestChunkRadius")
        else {
            return Ok(());
        };

        if request.radius <= 0 {
            self.kick(DISCONNECTED_BAD_PACKET)?;
            anyhow::bail!("Render distance must be greater than 0");
        }

        let radius = std::cmp::min(self.server_config().max_render_distance, request.radius);
        self.queue(ChunkRadiusUpdated { radius })?;
        self.queue(PlayStatus { status: Status::PlayerSpawn })?;
        self.flush()
    }

    /// Handles a [`SetLocalPlayerAsInitialized`] packet; the player has
    /// fully loaded in.
    fn handle_local_initialized(&self, body: &[u8]) -> anyhow::Result<()> {
        self.expect_state(SessionState::InGame, "SetLocalPlayerAsInitialized")?;
        let Some(request) =
            self.decode_lenient::<SetLocalPlayerAsInitialized>(body, "SetLocalPlayerAsInitialized")
        else {
            return Ok(());
        };

        tracing::debug!("[{}] Initialised with runtime ID {}", self.addr(), request.runtime_id);
        self.set_state(SessionState::Spawned);
        Ok(())
    }
}
