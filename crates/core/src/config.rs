//! Builder-style configuration for the three personas.

use std::sync::Arc;

use proto::auth::{IdentityProvider, UserPayload};
use proto::bedrock::{ClientThrottleSettings, CompressionAlgorithm, NETWORK_VERSION};

/// Configuration for a server or a bridge's downstream side.
#[derive(Clone)]
pub struct ServerConfig {
    /// The compression algorithm announced in NetworkSettings.
    ///
    /// Default: [`Flate`](CompressionAlgorithm::Flate).
    pub compression_algorithm: CompressionAlgorithm,
    /// The batch length compression threshold.
    ///
    /// Batches at or below this size are carried uncompressed. Setting
    /// this to 0 disables compression.
    ///
    /// Default: 1.
    pub compression_threshold: u16,
    /// Client throttling settings, forwarded verbatim.
    ///
    /// Default: disabled.
    pub client_throttle: ClientThrottleSettings,
    /// Maximum render distance handed out to clients.
    ///
    /// Default: 12.
    pub max_render_distance: i32,
    /// Refuse chains that were not signed by Mojang.
    ///
    /// Default: false, allowing offline (self-signed) clients.
    pub require_xbox_auth: bool,
    /// When set, the `ServerAddress` in the user payload must equal
    /// this value, mirroring what real servers enforce.
    ///
    /// Default: None.
    pub advertised_address: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            compression_algorithm: CompressionAlgorithm::Flate,
            compression_threshold: 1,
            client_throttle: ClientThrottleSettings::disabled(),
            max_render_distance: 12,
            require_xbox_auth: false,
            advertised_address: None,
        }
    }
}

/// Configuration for an outbound client.
#[derive(Clone)]
pub struct ClientOptions {
    /// Display name used for offline authentication.
    pub username: String,
    /// Authenticate with a self-signed chain instead of an identity
    /// provider.
    ///
    /// Default: true.
    pub offline: bool,
    /// Identity provider for online authentication. Required when
    /// `offline` is false.
    pub provider: Option<Arc<dyn IdentityProvider>>,
    /// The address advertised to the server inside the user payload.
    pub server_address: String,
    /// Protocol version to announce.
    ///
    /// Default: [`NETWORK_VERSION`].
    pub protocol_version: i32,
    /// Overrides the generated user payload entirely. Bridges use this
    /// to forward the downstream player's payload.
    pub payload: Option<UserPayload>,
}

impl ClientOptions {
    /// Offline options for the given username and target address.
    pub fn offline(username: impl Into<String>, server_address: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            offline: true,
            provider: None,
            server_address: server_address.into(),
            protocol_version: NETWORK_VERSION,
            payload: None,
        }
    }
}

/// Configuration for the man-in-the-middle bridge.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Settings for the downstream (server-facing-the-client) side.
    pub downstream: ServerConfig,
    /// Address of the real server, written into the upstream payload's
    /// `ServerAddress`.
    pub upstream_address: String,
    /// Identity provider for the upstream connection. Without one the
    /// bridge logs in upstream with a self-signed chain.
    pub provider: Option<Arc<dyn IdentityProvider>>,
}

impl BridgeConfig {
    pub fn new(upstream_address: impl Into<String>) -> Self {
        Self {
            downstream: ServerConfig::default(),
            upstream_address: upstream_address.into(),
            provider: None,
        }
    }
}
