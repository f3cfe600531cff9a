use util::{BinaryRead, BinaryWrite, Deserialize, Serialize, VarLen};

use crate::bedrock::ConnectedPacket;

pub const DISCONNECTED_NOT_AUTHENTICATED: &str = "disconnectionScreen.notAuthenticated";
pub const DISCONNECTED_NO_REASON: &str = "disconnectionScreen.noReason";
pub const DISCONNECTED_TIMEOUT: &str = "disconnectionScreen.timeout";
pub const DISCONNECTED_LOGIN_FAILED: &str = "disconnect.loginFailed";
pub const DISCONNECTED_ENCRYPTION_FAIL: &str = "Encryption checksums do not match.";
pub const DISCONNECTED_BAD_PACKET: &str = "Client sent bad packet.";
/// Sent when authentication fails; kept as a version complaint because
/// every client version displays it without a raw JSON fallback.
pub const DISCONNECTED_VERSION_MISMATCH: &str = "disconnectionScreen.outdatedServer";
/// Sent when a packet arrives in a state that does not allow it.
pub const DISCONNECTED_PROTOCOL: &str = "disconnectionScreen.badPacket";

/// Sent by the server to disconnect a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    /// Whether to immediately send the client to the main menu.
    pub hide_message: bool,
    /// Message to display to the client.
    pub message: String,
}

impl ConnectedPacket for Disconnect {
    const ID: u32 = 0x05;

    fn serialized_size(&self) -> usize {
        1 + self.message.var_len()
    }
}

impl Serialize for Disconnect {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_bool(self.hide_message)?;
        writer.write_str(&self.message)
    }
}

impl<'a> Deserialize<'a> for Disconnect {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let hide_message = reader.read_bool()?;
        let message = if reader.eof() { String::new() } else { reader.read_str()?.to_owned() };

        Ok(Self { hide_message, message })
    }
}
