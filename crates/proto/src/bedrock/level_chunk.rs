use util::{BinaryRead, BinaryWrite, Deserialize, Serialize};

use crate::bedrock::ConnectedPacket;

/// A column of chunk data sent to the client.
///
/// The sub-chunk payload itself is opaque to this crate; a relay only
/// needs the position, the cache negotiation fields and the raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelChunk {
    /// Chunk position on the X axis.
    pub x: i32,
    /// Chunk position on the Z axis.
    pub z: i32,
    /// Amount of sub-chunks in the payload.
    pub sub_chunk_count: u32,
    /// Whether the payload was replaced by blob-cache hashes.
    pub cache_enabled: bool,
    /// Blob hashes, present only when the cache is enabled.
    pub blob_hashes: Vec<u64>,
    /// Serialised sub-chunk data.
    pub payload: Vec<u8>,
}

impl ConnectedPacket for LevelChunk {
    const ID: u32 = 0x3a;

    fn serialized_size(&self) -> usize {
        10 + 5 + 1 + 5 + self.blob_hashes.len() * 8 + self.payload.len()
    }
}

impl Serialize for LevelChunk {
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_var_i32(self.x)?;
        writer.write_var_i32(self.z)?;
        writer.write_var_u32(self.sub_chunk_count)?;
        writer.write_bool(self.cache_enabled)?;

        if self.cache_enabled {
            writer.write_var_u32(self.blob_hashes.len() as u32)?;
            for hash in &self.blob_hashes {
                writer.write_u64_le(*hash)?;
            }
        }

        writer.write_var_u32(self.payload.len() as u32)?;
        writer.write_all(&self.payload)
    }
}

impl<'a> Deserialize<'a> for LevelChunk {
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self> {
        let x = reader.read_var_i32()?;
        let z = reader.read_var_i32()?;
        let sub_chunk_count = reader.read_var_u32()?;
        let cache_enabled = reader.read_bool()?;

        let mut blob_hashes = Vec::new();
        if cache_enabled {
            let count = reader.read_var_u32()? as usize;
            if count * 8 > reader.remaining() {
                anyhow::bail!("Blob hash count {count} exceeds the packet size");
            }

            blob_hashes.reserve(count);
            for _ in 0..count {
                blob_hashes.push(reader.read_u64_le()?);
            }
        }

        let length = reader.read_var_u32()?;
        let payload = reader.take_n(length as usize)?.to_vec();

        Ok(Self { x, z, sub_chunk_count, cache_enabled, blob_hashes, payload })
    }
}

impl LevelChunk {
    /// A decoder that tolerates payload revisions it does not understand.
    ///
    /// Position and sub-chunk count are decoded normally; everything after
    /// them is swallowed into the payload. Used by relays that must never
    /// drop a chunk because of a format change.
    pub fn deserialize_lenient(buffer: &[u8]) -> anyhow::Result<Self> {
        if let Ok(full) = Self::deserialize(buffer) {
            return Ok(full);
        }

        let mut reader = buffer;

        let x = reader.read_var_i32()?;
        let z = reader.read_var_i32()?;
        let sub_chunk_count = reader.read_var_u32()?;

        Ok(Self {
            x,
            z,
            sub_chunk_count,
            cache_enabled: false,
            blob_hashes: Vec::new(),
            payload: reader.take_rest()?.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_roundtrip() {
        let chunk = LevelChunk {
            x: -3,
            z: 7,
            sub_chunk_count: 4,
            cache_enabled: true,
            blob_hashes: vec![0xdead_beef, 0xcafe_babe],
            payload: vec![1, 2, 3, 4],
        };

        let serialized = chunk.serialize().unwrap();
        assert_eq!(LevelChunk::deserialize(&serialized).unwrap(), chunk);
    }

    #[test]
    fn lenient_decoder_swallows_unknown_tail() {
        let mut buffer = Vec::new();
        buffer.write_var_i32(1).unwrap();
        buffer.write_var_i32(2).unwrap();
        buffer.write_var_u32(3).unwrap();
        // A tail that the strict decoder chokes on: claims a cache with a
        // byte count far past the end of the buffer.
        buffer.write_bool(true).unwrap();
        buffer.write_var_u32(9999).unwrap();

        let chunk = LevelChunk::deserialize_lenient(&buffer).unwrap();
        assert_eq!((chunk.x, chunk.z, chunk.sub_chunk_count), (1, 2, 3));
        assert!(!chunk.payload.is_empty());
    }
}
