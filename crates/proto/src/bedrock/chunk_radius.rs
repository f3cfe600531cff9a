use util::{BinaryRead, BinaryWrite, Deserialize, Serialize};

use crate::bedrock::ConnectedPacket;

/// Sent by the client to request a render distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestChunkRadius {
    /// Requested render distance in chunks.
    pub radius: i32,
    /// Hard maximum the client will ever use.
    pub max_radius: u8,
}

impl ConnectedPacket for RequestChunkRadius {
    const ID: u32 = 0x45;

    fn serialized_size(&self) -> usize {
        6
    }
}

impl Serialize for RequestChunkRadius {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_var_i32(self.radius)?;
        writer.write_u8(self.max_radius)
    }
}

impl<'a> Deserialize<'a> for RequestChunkRadius {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        Ok(Self { radius: reader.read_var_i32()?, max_radius: reader.read_u8()? })
    }
}

/// Sent by the server to tell the client the final render distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRadiusUpdated {
    /// The render distance the server settled on.
    pub radius: i32,
}

impl ConnectedPacket for ChunkRadiusUpdated {
    const ID: u32 = 0x46;

    fn serialized_size(&self) -> usize {
        5
    }
}

impl Serialize for ChunkRadiusUpdated {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_var_i32(self.radius)
    }
}

impl<'a> Deserialize<'a> for ChunkRadiusUpdated {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        Ok(Self { radius: reader.read_var_i32()? })
    }
}
