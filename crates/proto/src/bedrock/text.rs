use util::{BinaryRead, BinaryWrite, Deserialize, Serialize, VarLen};

use crate::bedrock::ConnectedPacket;

/// The message variants a [`TextMessage`] can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextData {
    /// A bare message without a sender.
    Raw {
        message: String,
    },
    /// A chat message from a named player.
    Chat {
        source: String,
        message: String,
    },
    /// A message resolved against the client's translation table.
    Translation {
        message: String,
        parameters: Vec<String>,
    },
    /// A system message, displayed like raw text.
    System {
        message: String,
    },
}

impl TextData {
    fn discriminant(&self) -> u8 {
        match self {
            Self::Raw { .. } => 0,
            Self::Chat { .. } => 1,
            Self::Translation { .. } => 2,
            Self::System { .. } => 6,
        }
    }

    /// The message carried by this variant.
    pub fn message(&self) -> &str {
        match self {
            Self::Raw { message }
            | Self::Chat { message, .. }
            | Self::Translation { message, .. }
            | Self::System { message } => message,
        }
    }

    /// Mutable access to the carried message.
    pub fn message_mut(&mut self) -> &mut String {
        match self {
            Self::Raw { message }
            | Self::Chat { message, .. }
            | Self::Translation { message, .. }
            | Self::System { message } => message,
        }
    }
}

/// A chat or system message travelling in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    /// The message and its variant-specific fields.
    pub data: TextData,
    /// Whether the client should run the message through its
    /// translation table.
    pub needs_translation: bool,
    /// XUID of the sender, empty for server messages.
    pub xuid: String,
    /// Identifies the sending platform's chat session.
    pub platform_chat_id: String,
}

impl ConnectedPacket for TextMessage {
    const ID: u32 = 0x09;

    fn serialized_size(&self) -> usize {
        2 + self.data.message().var_len() + self.xuid.var_len() + self.platform_chat_id.var_len() + 16
    }
}

impl Serialize for TextMessage {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_u8(self.data.discriminant())?;
        writer.write_bool(self.needs_translation)?;

        match &self.data {
            TextData::Raw { message } | TextData::System { message } => {
                writer.write_str(message)?;
            }
            TextData::Chat { source, message } => {
                writer.write_str(source)?;
                writer.write_str(message)?;
            }
            TextData::Translation { message, parameters } => {
                writer.write_str(message)?;
                writer.write_var_u32(parameters.len() as u32)?;
                for parameter in parameters {
                    writer.write_str(parameter)?;
                }
            }
        }

        writer.write_str(&self.xuid)?;
        writer.write_str(&self.platform_chat_id)
    }
}

impl<'a> Deserialize<'a> for TextMessage {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let discriminant = reader.read_u8()?;
        let needs_translation = reader.read_bool()?;

        let data = match discriminant {
            0 => TextData::Raw { message: reader.read_str()?.to_owned() },
            1 => TextData::Chat {
                source: reader.read_str()?.to_owned(),
                message: reader.read_str()?.to_owned(),
            },
            2 => {
                let message = reader.read_str()?.to_owned();
                let count = reader.read_var_u32()?;
                if count as usize > reader.remaining() {
                    anyhow::bail!("Parameter count {count} exceeds the packet size");
                }

                let mut parameters = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    parameters.push(reader.read_str()?.to_owned());
                }

                TextData::Translation { message, parameters }
            }
            6 => TextData::System { message: reader.read_str()?.to_owned() },
            _ => anyhow::bail!("Invalid message type: {discriminant}"),
        };

        Ok(Self {
            data,
            needs_translation,
            xuid: reader.read_str()?.to_owned(),
            platform_chat_id: reader.read_str()?.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_roundtrip() {
        let message = TextMessage {
            data: TextData::Chat { source: "Steve".to_owned(), message: "hello".to_owned() },
            needs_translation: false,
            xuid: String::new(),
            platform_chat_id: String::new(),
        };

        let serialized = message.serialize().unwrap();
        assert_eq!(TextMessage::deserialize(&serialized).unwrap(), message);
    }

    #[test]
    fn translation_roundtrip() {
        let message = TextMessage {
            data: TextData::Translation {
                message: "multiplayer.player.joined".to_owned(),
                parameters: vec!["§eSteve".to_owned()],
            },
            needs_translation: true,
            xuid: String::new(),
            platform_chat_id: String::new(),
        };

        let serialized = message.serialize().unwrap();
        assert_eq!(TextMessage::deserialize(&serialized).unwrap(), message);
    }
}
