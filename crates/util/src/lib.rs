//! Shared binary serialisation utilities.

pub mod bytes;

pub use bytes::{size_of_var_u32, size_of_var_u64, BinaryRead, BinaryWrite, VarLen};

/// Adds the ability to serialise a type into a binary writer.
pub trait Serialize {
    /// Serialises the type into the given writer.
    fn serialize_into<W: BinaryWrite>(&self, writer: &mut W) -> anyhow::Result<()>;

    /// Serialises the type into a newly allocated buffer.
    fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        let mut writer = Vec::new();
        self.serialize_into(&mut writer)?;
        Ok(writer)
    }
}

/// Adds the ability to deserialise a type from a binary reader.
///
/// The lifetime parameter allows implementations to borrow from the
/// buffer instead of copying out of it.
pub trait Deserialize<'a>: Sized {
    /// Deserialises the type from the given reader.
    fn deserialize_from<R: BinaryRead<'a>>(reader: &mut R) -> anyhow::Result<Self>;

    /// Deserialises the type from a byte slice.
    fn deserialize(buffer: &'a [u8]) -> anyhow::Result<Self> {
        let mut reader = buffer;
        Self::deserialize_from(&mut reader)
    }
}
