//! Typed Bedrock game packets and the packet catalog.

use util::Serialize;

pub mod cache_status;
pub mod catalog;
pub mod chunk_radius;
pub mod disconnect;
pub mod handshake;
pub mod header;
pub mod level_chunk;
pub mod loading_screen;
pub mod login;
pub mod network_settings;
pub mod play_status;
pub mod resource_packs;
pub mod start_game;
pub mod text;

pub use cache_status::ClientCacheStatus;
pub use catalog::{catalog, DecodeFn, GamePacket, PacketCatalog, PacketName};
pub use chunk_radius::{ChunkRadiusUpdated, RequestChunkRadius};
pub use disconnect::{
    Disconnect, DISCONNECTED_BAD_PACKET, DISCONNECTED_ENCRYPTION_FAIL, DISCONNECTED_LOGIN_FAILED,
    DISCONNECTED_NO_REASON, DISCONNECTED_NOT_AUTHENTICATED, DISCONNECTED_PROTOCOL,
    DISCONNECTED_TIMEOUT, DISCONNECTED_VERSION_MISMATCH,
};
pub use handshake::{ClientToServerHandshake, ServerToClientHandshake};
pub use header::Header;
pub use level_chunk::LevelChunk;
pub use loading_screen::{LoadingScreenType, ServerboundLoadingScreen};
pub use login::{Login, SetLocalPlayerAsInitialized};
pub use network_settings::{
    ClientThrottleSettings, CompressionAlgorithm, NetworkSettings, RequestNetworkSettings,
};
pub use play_status::{PlayStatus, Status};
pub use resource_packs::{
    PackEntry, ResourcePackClientResponse, ResourcePackStack, ResourcePacksInfo, ResponseStatus,
    StackEntry,
};
pub use start_game::StartGame;
pub use text::{TextData, TextMessage};

/// The marker byte leading every game-layer payload handed to RakNet.
pub const GAME_PACKET_ID: u8 = 0xfe;

/// The single protocol revision this build speaks.
pub const NETWORK_VERSION: i32 = 766;

/// Game version string matching [`NETWORK_VERSION`].
pub const CLIENT_VERSION_STRING: &str = "1.21.50";

/// Implemented by all game packets in the catalog.
pub trait ConnectedPacket {
    /// Unique ID of this packet.
    const ID: u32;

    /// Estimated size of the serialised packet body, used to
    /// preallocate output buffers.
    fn serialized_size(&self) -> usize {
        0
    }
}

/// Serialises a packet body together with its header.
pub fn serialize_packet<T: ConnectedPacket + Serialize>(packet: &T) -> anyhow::Result<Vec<u8>> {
    let header = Header::new(T::ID);

    let mut writer = Vec::with_capacity(header.serialized_size() + packet.serialized_size());
    header.serialize_into(&mut writer)?;
    packet.serialize_into(&mut writer)?;

    Ok(writer)
}
