use dashmap::DashMap;
use lazy_static::lazy_static;
use util::{BinaryWrite, Deserialize, Serialize};

use crate::bedrock::{
    serialize_packet, ChunkRadiusUpdated, ClientCacheStatus, ClientToServerHandshake, ConnectedPacket,
    Disconnect, Header, LevelChunk, Login, NetworkSettings, PlayStatus, RequestChunkRadius,
    RequestNetworkSettings, ResourcePackClientResponse, ResourcePackStack, ResourcePacksInfo,
    ServerToClientHandshake, ServerboundLoadingScreen, SetLocalPlayerAsInitialized, StartGame,
    TextMessage,
};

/// Decodes a packet body (without header) into a typed record.
pub type DecodeFn = fn(&[u8]) -> anyhow::Result<GamePacket>;

fn decode_typed<T>(body: &[u8]) -> anyhow::Result<GamePacket>
where
    T: for<'a> Deserialize<'a> + Into<GamePacket>,
{
    Ok(T::deserialize(body)?.into())
}

macro_rules! declare_catalog {
    ($($name: ident: $ty: ty),+ $(,)?) => {
        /// Names of all packets known to the catalog.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PacketName {
            $($name),+
        }

        impl PacketName {
            /// Resolves a packet id to its name.
            pub fn from_id(id: u32) -> Option<Self> {
                match id {
                    $(<$ty as ConnectedPacket>::ID => Some(Self::$name),)+
                    _ => None,
                }
            }

            /// The canonical name of the packet.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name)),+
                }
            }

            /// The id of the packet.
            pub const fn id(self) -> u32 {
                match self {
                    $(Self::$name => <$ty as ConnectedPacket>::ID),+
                }
            }
        }

        impl std::fmt::Display for PacketName {
            fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
                fmt.write_str(self.as_str())
            }
        }

        /// A deserialised game packet.
        ///
        /// Ids the catalog does not know survive as [`Unknown`](GamePacket::Unknown)
        /// and can still be routed by id or passed through verbatim.
        #[derive(Debug, Clone, PartialEq)]
        pub enum GamePacket {
            $($name($ty),)+
            /// A packet without a registered decoder.
            Unknown {
                id: u32,
                body: Vec<u8>,
            },
        }

        $(
            impl From<$ty> for GamePacket {
                fn from(packet: $ty) -> Self {
                    Self::$name(packet)
                }
            }
        )+

        impl GamePacket {
            /// The wire id of this packet.
            pub fn id(&self) -> u32 {
                match self {
                    $(Self::$name(_) => <$ty as ConnectedPacket>::ID,)+
                    Self::Unknown { id, .. } => *id,
                }
            }

            /// The catalog name of this packet, if it has one.
            pub fn name(&self) -> Option<PacketName> {
                match self {
                    $(Self::$name(_) => Some(PacketName::$name),)+
                    Self::Unknown { id, .. } => PacketName::from_id(*id),
                }
            }

            /// Serialises the packet with its header; the first byte of the
            /// output encodes the packet id.
            pub fn serialize(&self) -> anyhow::Result<Vec<u8>> {
                match self {
                    $(Self::$name(packet) => serialize_packet(packet),)+
                    Self::Unknown { id, body } => {
                        let header = Header::new(*id);
                        let mut writer = Vec::with_capacity(header.serialized_size() + body.len());
                        header.serialize_into(&mut writer)?;
                        writer.write_all(body)?;
                        Ok(writer)
                    }
                }
            }
        }

        impl PacketCatalog {
            fn bedrock() -> Self {
                let catalog = Self { decoders: DashMap::new() };
                $(catalog.register(<$ty as ConnectedPacket>::ID, decode_typed::<$ty>);)+
                catalog
            }
        }
    }
}

declare_catalog! {
    Login: Login,
    PlayStatus: PlayStatus,
    ServerToClientHandshake: ServerToClientHandshake,
    ClientToServerHandshake: ClientToServerHandshake,
    Disconnect: Disconnect,
    ResourcePacksInfo: ResourcePacksInfo,
    ResourcePackStack: ResourcePackStack,
    ResourcePackClientResponse: ResourcePackClientResponse,
    Text: TextMessage,
    StartGame: StartGame,
    LevelChunk: LevelChunk,
    RequestChunkRadius: RequestChunkRadius,
    ChunkRadiusUpdated: ChunkRadiusUpdated,
    SetLocalPlayerAsInitialized: SetLocalPlayerAsInitialized,
    ClientCacheStatus: ClientCacheStatus,
    NetworkSettings: NetworkSettings,
    RequestNetworkSettings: RequestNetworkSettings,
    ServerboundLoadingScreen: ServerboundLoadingScreen,
}

/// Maps packet ids to typed decoders.
///
/// The catalog is process-wide and read-mostly; individual entries can be
/// replaced at runtime, which relays use to install more forgiving
/// decoders for chunk data.
pub struct PacketCatalog {
    decoders: DashMap<u32, DecodeFn>,
}

impl PacketCatalog {
    /// Replaces the decoder for the given packet id.
    pub fn register(&self, id: u32, decoder: DecodeFn) {
        self.decoders.insert(id, decoder);
    }

    /// Reads the header of a framed packet without decoding the body.
    pub fn peek_header(frame: &[u8]) -> anyhow::Result<Header> {
        Header::deserialize(frame)
    }

    /// Decodes a full framed packet (header followed by body).
    ///
    /// Decode failures of known packets are returned as errors and are
    /// never fatal to a connection; the caller still has the raw bytes.
    pub fn decode(&self, frame: &[u8]) -> anyhow::Result<GamePacket> {
        let mut reader = frame;
        let header = Header::deserialize_from(&mut reader)?;

        self.decode_body(header.id, reader)
    }

    /// Decodes a packet body for a previously read header.
    pub fn decode_body(&self, id: u32, body: &[u8]) -> anyhow::Result<GamePacket> {
        match self.decoders.get(&id) {
            Some(decoder) => decoder(body),
            None => Ok(GamePacket::Unknown { id, body: body.to_vec() }),
        }
    }
}

lazy_static! {
    static ref CATALOG: PacketCatalog = PacketCatalog::bedrock();
}

/// The process-wide packet catalog.
pub fn catalog() -> &'static PacketCatalog {
    &CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bedrock::Status;

    #[test]
    fn decode_known_packet() {
        let packet = GamePacket::PlayStatus(PlayStatus { status: Status::LoginSuccess });
        let serialized = packet.serialize().unwrap();

        let decoded = catalog().decode(&serialized).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn unknown_id_survives_as_raw_bytes() {
        let packet = GamePacket::Unknown { id: 0x1f0, body: vec![1, 2, 3] };
        let serialized = packet.serialize().unwrap();

        let decoded = catalog().decode(&serialized).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.id(), 0x1f0);

        // And it reserialises to the same bytes.
        assert_eq!(decoded.serialize().unwrap(), serialized);
    }

    #[test]
    fn decode_failure_is_an_error_not_a_panic() {
        let mut serialized = GamePacket::PlayStatus(PlayStatus { status: Status::PlayerSpawn })
            .serialize()
            .unwrap();
        serialized.truncate(2);

        assert!(catalog().decode(&serialized).is_err());
    }

    #[test]
    fn name_lookups() {
        assert_eq!(PacketName::from_id(0x81), Some(PacketName::ClientCacheStatus));
        assert_eq!(PacketName::ClientCacheStatus.as_str(), "ClientCacheStatus");
        assert_eq!(PacketName::ServerboundLoadingScreen.id(), 0x138);
        assert_eq!(PacketName::from_id(0x1f0), None);
    }

    #[test]
    fn override_replaces_decoder() {
        let catalog = PacketCatalog::bedrock();
        catalog.register(LevelChunk::ID, |body| {
            LevelChunk::deserialize_lenient(body).map(Into::into)
        });

        let mut buffer = Vec::new();
        Header::new(LevelChunk::ID).serialize_into(&mut buffer).unwrap();
        buffer.write_var_i32(0).unwrap();
        buffer.write_var_i32(0).unwrap();
        buffer.write_var_u32(1).unwrap();
        buffer.write_bool(true).unwrap();
        buffer.write_var_u32(u32::MAX).unwrap();

        // The strict decoder rejects this, the lenient one does not.
        assert!(catalog.decode(&buffer).is_ok());
    }
}
