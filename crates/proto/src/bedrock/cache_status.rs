use util::{BinaryRead, BinaryWrite, Deserialize, Serialize};

use crate::bedrock::ConnectedPacket;

/// Sent during login to let the server know whether the client supports
/// the client-side blob cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientCacheStatus {
    /// Whether the blob cache is enabled.
    pub enabled: bool,
}

impl ConnectedPacket for ClientCacheStatus {
    const ID: u32 = 0x81;

    fn serialized_size(&self) -> usize {
        1
    }
}

impl Serialize for ClientCacheStatus {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_bool(self.enabled)
    }
}

impl<'a> Deserialize<'a> for ClientCacheStatus {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        Ok(Self { enabled: reader.read_bool()? })
    }
}
