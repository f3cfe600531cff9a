use util::{BinaryRead, BinaryWrite, Deserialize, Serialize};

use crate::bedrock::ConnectedPacket;

/// Loading screen lifecycle events reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LoadingScreenType {
    Unknown,
    StartLoadingScreen,
    EndLoadingScreen,
}

impl TryFrom<i32> for LoadingScreenType {
    type Error = anyhow::Error;

    fn try_from(value: i32) -> anyhow::Result<Self> {
        Ok(match value {
            0 => Self::Unknown,
            1 => Self::StartLoadingScreen,
            2 => Self::EndLoadingScreen,
            _ => anyhow::bail!("Invalid loading screen type: {value}"),
        })
    }
}

/// Sent by the client when its loading screen opens or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerboundLoadingScreen {
    /// Which lifecycle event occurred.
    pub screen_type: LoadingScreenType,
    /// Identifies the screen instance, when the client assigned one.
    pub screen_id: Option<u32>,
}

impl ConnectedPacket for ServerboundLoadingScreen {
    const ID: u32 = 0x138;

    fn serialized_size(&self) -> usize {
        5 + 1 + 4
    }
}

impl Serialize for ServerboundLoadingScreen {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_var_i32(self.screen_type as i32)?;
        writer.write_bool(self.screen_id.is_some())?;
        if let Some(id) = self.screen_id {
            writer.write_u32_le(id)?;
        }
        Ok(())
    }
}

impl<'a> Deserialize<'a> for ServerboundLoadingScreen {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let screen_type = LoadingScreenType::try_from(reader.read_var_i32()?)?;
        let screen_id = if reader.read_bool()? { Some(reader.read_u32_le()?) } else { None };

        Ok(Self { screen_type, screen_id })
    }
}
