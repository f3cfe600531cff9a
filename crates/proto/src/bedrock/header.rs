use util::{size_of_var_u32, BinaryRead, BinaryWrite, Deserialize, Serialize};

/// Packet ids occupy the low 10 bits of the header varint.
pub const PACKET_ID_MASK: u32 = 0x3ff;

/// Header prefixed to every game packet inside a batch.
///
/// The sub-client fields are used by split-screen clients and are zero
/// everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Id of the packet that follows this header.
    pub id: u32,
    /// Sub-client that sent the packet.
    pub sender_subclient: u8,
    /// Sub-client the packet is addressed to.
    pub target_subclient: u8,
}

impl Header {
    /// Creates a header addressed to the primary client.
    pub const fn new(id: u32) -> Self {
        Self { id, sender_subclient: 0, target_subclient: 0 }
    }

    pub fn serialized_size(&self) -> usize {
        size_of_var_u32(self.to_varint())
    }

    fn to_varint(self) -> u32 {
        self.id & PACKET_ID_MASK
            | ((self.sender_subclient as u32) << 10)
            | ((self.target_subclient as u32) << 12)
    }
}

impl Serialize for Header {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_var_u32(self.to_varint())
    }
}

impl<'a> Deserialize<'a> for Header {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let value = reader.read_var_u32()?;

        Ok(Self {
            id: value & PACKET_ID_MASK,
            sender_subclient: ((value >> 10) & 0x3) as u8,
            target_subclient: ((value >> 12) & 0x3) as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        for id in [0x01, 0x81, 0x138, 0x1ff] {
            let header = Header::new(id);
            let serialized = header.serialize().unwrap();

            assert_eq!(serialized.len(), header.serialized_size());
            assert_eq!(Header::deserialize(&serialized).unwrap(), header);
        }
    }

    #[test]
    fn subclients_do_not_clobber_id() {
        let header = Header { id: 0x3a, sender_subclient: 1, target_subclient: 2 };
        let serialized = header.serialize().unwrap();

        assert_eq!(Header::deserialize(&serialized).unwrap(), header);
    }
}
