use util::{BinaryRead, BinaryWrite, Deserialize, Serialize};

use crate::bedrock::ConnectedPacket;

/// Supported compression algorithms.
///
/// Snappy is fast, but produces lower compression ratios.
/// Flate is slow, but produces high compression ratios.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum CompressionAlgorithm {
    /// The Deflate/Zlib compression algorithm.
    Flate,
    /// The Snappy compression algorithm.
    Snappy,
}

impl TryFrom<u16> for CompressionAlgorithm {
    type Error = anyhow::Error;

    fn try_from(value: u16) -> anyhow::Result<Self> {
        Ok(match value {
            0 => Self::Flate,
            1 => Self::Snappy,
            _ => anyhow::bail!("Invalid compression algorithm: {value}"),
        })
    }
}

/// Settings for client throttling.
///
/// If client throttling is enabled, the client will tick fewer players,
/// improving performance on low-end devices.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClientThrottleSettings {
    /// Regulates whether the client should throttle players.
    pub enabled: bool,
    /// Threshold for client throttling.
    /// If the number of players in the game exceeds this value, players will be throttled.
    pub threshold: u8,
    /// Amount of players that are ticked when throttling is enabled.
    pub scalar: f32,
}

impl ClientThrottleSettings {
    /// Throttling disabled entirely.
    pub const fn disabled() -> Self {
        Self { enabled: false, threshold: 0, scalar: 0.0 }
    }
}

/// Sent by the client to request the server's network settings.
///
/// This is the first packet on every connection and is never
/// compressed or encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestNetworkSettings {
    /// Protocol version of the client.
    pub protocol_version: i32,
}

impl ConnectedPacket for RequestNetworkSettings {
    const ID: u32 = 0xc1;

    fn serialized_size(&self) -> usize {
        4
    }
}

impl Serialize for RequestNetworkSettings {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_i32_be(self.protocol_version)
    }
}

impl<'a> Deserialize<'a> for RequestNetworkSettings {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let protocol_version = reader.read_i32_be()?;

        Ok(Self { protocol_version })
    }
}

/// Sent by the server to modify network related settings.
/// Compression is enabled on both sides starting with the next batch
/// after this packet.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    /// Minimum size of a batch that is compressed.
    /// Any batch below this threshold will not be compressed.
    /// Setting this to 0 disables compression.
    pub compression_threshold: u16,
    /// Algorithm used to compress batches.
    pub compression_algorithm: CompressionAlgorithm,
    /// Client throttling settings.
    pub client_throttle: ClientThrottleSettings,
}

impl ConnectedPacket for NetworkSettings {
    const ID: u32 = 0x8f;

    fn serialized_size(&self) -> usize {
        2 + 2 + 1 + 1 + 4
    }
}

impl Serialize for NetworkSettings {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_u16_be(self.compression_threshold)?;
        writer.write_u16_be(self.compression_algorithm as u16)?;
        writer.write_bool(self.client_throttle.enabled)?;
        writer.write_u8(self.client_throttle.threshold)?;
        writer.write_f32_be(self.client_throttle.scalar)
    }
}

impl<'a> Deserialize<'a> for NetworkSettings {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let compression_threshold = reader.read_u16_be()?;
        let compression_algorithm = CompressionAlgorithm::try_from(reader.read_u16_be()?)?;
        let client_throttle = ClientThrottleSettings {
            enabled: reader.read_bool()?,
            threshold: reader.read_u8()?,
            scalar: reader.read_f32_be()?,
        };

        Ok(Self { compression_threshold, compression_algorithm, client_throttle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_settings_roundtrip() {
        let settings = NetworkSettings {
            compression_threshold: 512,
            compression_algorithm: CompressionAlgorithm::Flate,
            client_throttle: ClientThrottleSettings::disabled(),
        };

        let serialized = settings.serialize().unwrap();
        assert_eq!(serialized.len(), settings.serialized_size());
        assert_eq!(NetworkSettings::deserialize(&serialized).unwrap(), settings);
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let mut serialized = Vec::new();
        serialized.write_u16_be(256).unwrap();
        serialized.write_u16_be(7).unwrap();

        assert!(NetworkSettings::deserialize(&serialized).is_err());
    }
}
