use util::{BinaryRead, BinaryWrite, Deserialize, Serialize, VarLen};

use crate::bedrock::ConnectedPacket;

/// Sent by the server to initiate encryption.
/// The client responds with a [`ClientToServerHandshake`] to
/// indicate encryption has successfully been initiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerToClientHandshake {
    /// Token containing the salt and the server's public key.
    pub jwt: String,
}

impl ConnectedPacket for ServerToClientHandshake {
    const ID: u32 = 0x03;

    fn serialized_size(&self) -> usize {
        self.jwt.var_len()
    }
}

impl Serialize for ServerToClientHandshake {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_str(&self.jwt)
    }
}

impl<'a> Deserialize<'a> for ServerToClientHandshake {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        Ok(Self { jwt: reader.read_str()?.to_owned() })
    }
}

/// Sent by the client in response to a [`ServerToClientHandshake`].
/// This is the first encrypted packet in the session; it has no body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientToServerHandshake;

impl ConnectedPacket for ClientToServerHandshake {
    const ID: u32 = 0x04;
}

impl Serialize for ClientToServerHandshake {
    fn serialize_into<W: BinaryWrite>(&self, _writer: &mut W) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<'a> Deserialize<'a> for ClientToServerHandshake {
    fn deserialize_from<R: BinaryRead<'a>>(_reader: &mut R) -> anyhow::Result<Self> {
        Ok(Self)
    }
}
