use util::{BinaryRead, BinaryWrite, Deserialize, Serialize};

use crate::bedrock::ConnectedPacket;

/// Sent by the server to start the game session.
///
/// Only the spawn-relevant head of the packet is decoded; the long tail
/// of world settings is carried verbatim so the packet can be relayed
/// without understanding every revision of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartGame {
    /// Unique entity ID of the player.
    pub entity_id: i64,
    /// Runtime ID of the player.
    pub runtime_id: u64,
    /// Game mode assigned to the player.
    pub game_mode: i32,
    /// Spawn position.
    pub position: [f32; 3],
    /// Spawn rotation (pitch, yaw).
    pub rotation: [f32; 2],
    /// Remaining world settings, undecoded.
    pub rest: Vec<u8>,
}

impl ConnectedPacket for StartGame {
    const ID: u32 = 0x0b;

    fn serialized_size(&self) -> usize {
        10 + 10 + 5 + 12 + 8 + self.rest.len()
    }
}

impl Serialize for StartGame {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_var_i64(self.entity_id)?;
        writer.write_var_u64(self.runtime_id)?;
        writer.write_var_i32(self.game_mode)?;

        for coordinate in self.position {
            writer.write_f32_le(coordinate)?;
        }
        for angle in self.rotation {
            writer.write_f32_le(angle)?;
        }

        writer.write_all(&self.rest)
    }
}

impl<'a> Deserialize<'a> for StartGame {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let entity_id = reader.read_var_i64()?;
        let runtime_id = reader.read_var_u64()?;
        let game_mode = reader.read_var_i32()?;

        let mut position = [0.0; 3];
        for coordinate in &mut position {
            *coordinate = reader.read_f32_le()?;
        }

        let mut rotation = [0.0; 2];
        for angle in &mut rotation {
            *angle = reader.read_f32_le()?;
        }

        Ok(Self {
            entity_id,
            runtime_id,
            game_mode,
            position,
            rotation,
            rest: reader.take_rest()?.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_game_preserves_tail() {
        let start_game = StartGame {
            entity_id: 1,
            runtime_id: 1,
            game_mode: 1,
            position: [0.5, 64.0, -0.5],
            rotation: [0.0, 90.0],
            rest: vec![0xde, 0xad, 0xbe, 0xef],
        };

        let serialized = start_game.serialize().unwrap();
        let deserialized = StartGame::deserialize(&serialized).unwrap();

        assert_eq!(deserialized, start_game);
        assert_eq!(deserialized.rest, vec![0xde, 0xad, 0xbe, 0xef]);
    }
}
