use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use util::{BinaryRead, BinaryWrite, Deserialize, Serialize};

use crate::bedrock::ConnectedPacket;

/// The JSON envelope wrapping the identity chain inside a login packet.
#[derive(SerdeSerialize, SerdeDeserialize, Debug)]
struct TokenChain {
    /// Chain of JWTs.
    pub chain: Vec<String>,
}

/// Sent by the client to start the login sequence.
///
/// The packet body carries two length-prefixed tokens: the identity
/// chain (a JSON document with a list of JWTs) and the user token
/// holding skin and device data. Verification of both happens in the
/// session, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    /// Protocol version repeated from [`RequestNetworkSettings`](crate::bedrock::RequestNetworkSettings).
    pub protocol_version: i32,
    /// The identity JWT chain, innermost token last.
    pub identity_chain: Vec<String>,
    /// The user data JWT.
    pub user_token: String,
}

impl ConnectedPacket for Login {
    const ID: u32 = 0x01;

    fn serialized_size(&self) -> usize {
        // Length prefixes dominated by the tokens themselves.
        4 + 5 + 8 + self.identity_chain.iter().map(String::len).sum::<usize>() + self.user_token.len()
    }
}

impl Serialize for Login {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        let chain_json = serde_json::to_string(&TokenChain { chain: self.identity_chain.clone() })?;

        writer.write_i32_be(self.protocol_version)?;

        let request_length = 4 + chain_json.len() + 4 + self.user_token.len();
        writer.write_var_u32(request_length as u32)?;

        writer.write_u32_le(chain_json.len() as u32)?;
        writer.write_all(chain_json.as_bytes())?;
        writer.write_u32_le(self.user_token.len() as u32)?;
        writer.write_all(self.user_token.as_bytes())
    }
}

impl<'a> Deserialize<'a> for Login {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let protocol_version = reader.read_i32_be()?;
        let _request_length = reader.read_var_u32()?;

        let chain_length = reader.read_u32_le()?;
        let chain_json = reader.take_n(chain_length as usize)?;
        let tokens: TokenChain = serde_json::from_slice(chain_json)?;

        let token_length = reader.read_u32_le()?;
        let user_token = reader.take_n(token_length as usize)?;

        Ok(Self {
            protocol_version,
            identity_chain: tokens.chain,
            user_token: String::from_utf8(user_token.to_vec())?,
        })
    }
}

/// Sent by the client once it has fully loaded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLocalPlayerAsInitialized {
    /// Runtime ID assigned to the player by the server.
    pub runtime_id: u64,
}

impl ConnectedPacket for SetLocalPlayerAsInitialized {
    const ID: u32 = 0x71;

    fn serialized_size(&self) -> usize {
        10
    }
}

impl Serialize for SetLocalPlayerAsInitialized {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_var_u64(self.runtime_id)
    }
}

impl<'a> Deserialize<'a> for SetLocalPlayerAsInitialized {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        Ok(Self { runtime_id: reader.read_var_u64()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_roundtrip() {
        let login = Login {
            protocol_version: 766,
            identity_chain: vec!["first.token.a".to_owned(), "second.token.b".to_owned()],
            user_token: "user.token.c".to_owned(),
        };

        let serialized = login.serialize().unwrap();
        assert_eq!(Login::deserialize(&serialized).unwrap(), login);
    }

    #[test]
    fn login_rejects_truncated_chain() {
        let login = Login {
            protocol_version: 766,
            identity_chain: vec!["a.b.c".to_owned()],
            user_token: "d.e.f".to_owned(),
        };

        let serialized = login.serialize().unwrap();
        assert!(Login::deserialize(&serialized[..serialized.len() - 8]).is_err());
    }
}
