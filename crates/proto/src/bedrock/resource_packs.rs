use util::{BinaryRead, BinaryWrite, Deserialize, Serialize, VarLen};

use crate::bedrock::ConnectedPacket;

/// Reads a list length and sanity checks it against the remaining bytes,
/// every entry being at least one byte long.
fn read_list_length<'a, R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<usize> {
    let count = reader.read_var_u32()? as usize;
    if count > reader.remaining() {
        anyhow::bail!("List length {count} exceeds the packet size");
    }

    Ok(count)
}

/// Describes a single downloadable resource or behavior pack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackEntry {
    /// UUID of the pack.
    pub uuid: String,
    /// Version string of the pack.
    pub version: String,
    /// Download size in bytes.
    pub size: u64,
}

impl PackEntry {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_str(&self.uuid)?;
        writer.write_str(&self.version)?;
        writer.write_u64_le(self.size)
    }

    fn deserialize_from<'a, R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        Ok(Self {
            uuid: reader.read_str()?.to_owned(),
            version: reader.read_str()?.to_owned(),
            size: reader.read_u64_le()?,
        })
    }
}

/// Sent by the server to advertise its resource and behavior packs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePacksInfo {
    /// Whether the client must accept the packs to join.
    pub required: bool,
    /// Whether any of the packs contain scripts.
    pub scripting_enabled: bool,
    /// Forces the client to use the server's packs over local ones.
    pub forcing_server_packs: bool,
    /// Advertised behavior packs.
    pub behavior_info: Vec<PackEntry>,
    /// Advertised resource packs.
    pub resource_info: Vec<PackEntry>,
}

impl ConnectedPacket for ResourcePacksInfo {
    const ID: u32 = 0x06;

    fn serialized_size(&self) -> usize {
        3 + 10 + (self.behavior_info.len() + self.resource_info.len()) * 24
    }
}

impl Serialize for ResourcePacksInfo {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_bool(self.required)?;
        writer.write_bool(self.scripting_enabled)?;
        writer.write_bool(self.forcing_server_packs)?;

        writer.write_var_u32(self.behavior_info.len() as u32)?;
        for pack in &self.behavior_info {
            pack.serialize_into(writer)?;
        }

        writer.write_var_u32(self.resource_info.len() as u32)?;
        for pack in &self.resource_info {
            pack.serialize_into(writer)?;
        }

        Ok(())
    }
}

impl<'a> Deserialize<'a> for ResourcePacksInfo {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let required = reader.read_bool()?;
        let scripting_enabled = reader.read_bool()?;
        let forcing_server_packs = reader.read_bool()?;

        let behavior_count = read_list_length(reader)?;
        let mut behavior_info = Vec::with_capacity(behavior_count);
        for _ in 0..behavior_count {
            behavior_info.push(PackEntry::deserialize_from(reader)?);
        }

        let resource_count = read_list_length(reader)?;
        let mut resource_info = Vec::with_capacity(resource_count);
        for _ in 0..resource_count {
            resource_info.push(PackEntry::deserialize_from(reader)?);
        }

        Ok(Self { required, scripting_enabled, forcing_server_packs, behavior_info, resource_info })
    }
}

/// A pack reference inside the stack sent to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackEntry {
    /// UUID of the pack.
    pub uuid: String,
    /// Version string of the pack.
    pub version: String,
    /// Name of the subpack to use.
    pub subpack_name: String,
}

impl StackEntry {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_str(&self.uuid)?;
        writer.write_str(&self.version)?;
        writer.write_str(&self.subpack_name)
    }

    fn deserialize_from<'a, R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        Ok(Self {
            uuid: reader.read_str()?.to_owned(),
            version: reader.read_str()?.to_owned(),
            subpack_name: reader.read_str()?.to_owned(),
        })
    }
}

/// Sent by the server to specify the order packs are applied in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePackStack {
    /// Whether the client is forced to accept the stack.
    pub forced_to_accept: bool,
    /// Resource packs in application order.
    pub resource_packs: Vec<StackEntry>,
    /// Behavior packs in application order.
    pub behavior_packs: Vec<StackEntry>,
    /// Game version the packs were built for.
    pub game_version: String,
    /// Whether experiments were ever toggled on this world.
    pub experiments_previously_toggled: bool,
}

impl ConnectedPacket for ResourcePackStack {
    const ID: u32 = 0x07;

    fn serialized_size(&self) -> usize {
        1 + 10 + self.game_version.var_len() + 4 + 1
            + (self.resource_packs.len() + self.behavior_packs.len()) * 24
    }
}

impl Serialize for ResourcePackStack {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_bool(self.forced_to_accept)?;

        writer.write_var_u32(self.behavior_packs.len() as u32)?;
        for pack in &self.behavior_packs {
            pack.serialize_into(writer)?;
        }

        writer.write_var_u32(self.resource_packs.len() as u32)?;
        for pack in &self.resource_packs {
            pack.serialize_into(writer)?;
        }

        writer.write_str(&self.game_version)?;
        // Experiment list, unused.
        writer.write_u32_le(0)?;
        writer.write_bool(self.experiments_previously_toggled)
    }
}

impl<'a> Deserialize<'a> for ResourcePackStack {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let forced_to_accept = reader.read_bool()?;

        let behavior_count = read_list_length(reader)?;
        let mut behavior_packs = Vec::with_capacity(behavior_count);
        for _ in 0..behavior_count {
            behavior_packs.push(StackEntry::deserialize_from(reader)?);
        }

        let resource_count = read_list_length(reader)?;
        let mut resource_packs = Vec::with_capacity(resource_count);
        for _ in 0..resource_count {
            resource_packs.push(StackEntry::deserialize_from(reader)?);
        }

        let game_version = reader.read_str()?.to_owned();
        let _experiment_count = reader.read_u32_le()?;
        let experiments_previously_toggled = reader.read_bool()?;

        Ok(Self {
            forced_to_accept,
            resource_packs,
            behavior_packs,
            game_version,
            experiments_previously_toggled,
        })
    }
}

/// The client's verdict on the advertised packs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseStatus {
    /// No packs were advertised.
    None,
    /// The client refused the packs.
    Refused,
    /// The client wants the listed packs sent over.
    SendPacks,
    /// The client has all packs and awaits the stack.
    HaveAllPacks,
    /// Pack negotiation is complete.
    Completed,
}

impl TryFrom<u8> for ResponseStatus {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> anyhow::Result<Self> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Refused,
            2 => Self::SendPacks,
            3 => Self::HaveAllPacks,
            4 => Self::Completed,
            _ => anyhow::bail!("Invalid resource pack response status: {value}"),
        })
    }
}

/// Sent by the client in response to [`ResourcePacksInfo`] and
/// [`ResourcePackStack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePackClientResponse {
    /// The client's verdict.
    pub status: ResponseStatus,
    /// Packs the client still needs, as `uuid_version` identifiers.
    pub pack_ids: Vec<String>,
}

impl ConnectedPacket for ResourcePackClientResponse {
    const ID: u32 = 0x08;

    fn serialized_size(&self) -> usize {
        1 + 2 + self.pack_ids.iter().map(|id| id.len() + 2).sum::<usize>()
    }
}

impl Serialize for ResourcePackClientResponse {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_u8(self.status as u8)?;
        writer.write_u16_le(self.pack_ids.len() as u16)?;
        for id in &self.pack_ids {
            writer.write_str(id)?;
        }
        Ok(())
    }
}

impl<'a> Deserialize<'a> for ResourcePackClientResponse {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let status = ResponseStatus::try_from(reader.read_u8()?)?;
        let count = reader.read_u16_le()?;

        let mut pack_ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            pack_ids.push(reader.read_str()?.to_owned());
        }

        Ok(Self { status, pack_ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_info_roundtrip() {
        let info = ResourcePacksInfo {
            required: true,
            scripting_enabled: false,
            forcing_server_packs: false,
            behavior_info: vec![],
            resource_info: vec![PackEntry {
                uuid: "0fba4063-dba1-4281-9b89-ff9390653530".to_owned(),
                version: "1.0.0".to_owned(),
                size: 1024,
            }],
        };

        let serialized = info.serialize().unwrap();
        assert_eq!(ResourcePacksInfo::deserialize(&serialized).unwrap(), info);
    }

    #[test]
    fn stack_roundtrip() {
        let stack = ResourcePackStack {
            forced_to_accept: false,
            resource_packs: vec![StackEntry {
                uuid: "0fba4063-dba1-4281-9b89-ff9390653530".to_owned(),
                version: "1.0.0".to_owned(),
                subpack_name: String::new(),
            }],
            behavior_packs: vec![],
            game_version: "1.21.50".to_owned(),
            experiments_previously_toggled: false,
        };

        let serialized = stack.serialize().unwrap();
        assert_eq!(ResourcePackStack::deserialize(&serialized).unwrap(), stack);
    }

    #[test]
    fn response_roundtrip() {
        let response = ResourcePackClientResponse {
            status: ResponseStatus::HaveAllPacks,
            pack_ids: vec!["0fba4063_1.0.0".to_owned()],
        };

        let serialized = response.serialize().unwrap();
        assert_eq!(ResourcePackClientResponse::deserialize(&serialized).unwrap(), response);
    }
}
