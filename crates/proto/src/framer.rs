//! Concatenates and splits length-prefixed sub-packets inside one batch.
//!
//! The framer is pure and stateless; it knows nothing about compression
//! or encryption.

use util::{size_of_var_u32, BinaryRead, BinaryWrite};

use crate::CodecError;

/// Concatenates sub-packets, each prefixed with its length as an
/// unsigned varint.
pub fn frame<B: AsRef<[u8]>>(packets: &[B]) -> anyhow::Result<Vec<u8>> {
    let size = packets
        .iter()
        .map(|packet| {
            let len = packet.as_ref().len();
            size_of_var_u32(len as u32) + len
        })
        .sum();

    let mut writer = Vec::with_capacity(size);
    for packet in packets {
        writer.write_var_u32(packet.as_ref().len() as u32)?;
        writer.write_all(packet.as_ref())?;
    }

    Ok(writer)
}

/// Splits a framed batch back into sub-packet slices, reading until the
/// buffer is exhausted.
pub fn unframe(mut batch: &[u8]) -> anyhow::Result<Vec<&[u8]>> {
    let mut packets = Vec::new();

    while !batch.eof() {
        let length = batch.read_var_u32()? as usize;
        if length > batch.remaining() {
            return Err(CodecError::TruncatedFrame { length, remaining: batch.remaining() }.into());
        }

        packets.push(batch.take_n(length)?);
    }

    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let packets: Vec<Vec<u8>> = vec![vec![1, 2, 3], vec![], vec![0xfe; 300]];

        let framed = frame(&packets).unwrap();
        let unframed = unframe(&framed).unwrap();

        assert_eq!(unframed, packets.iter().map(Vec::as_slice).collect::<Vec<_>>());
    }

    #[test]
    fn empty_batch() {
        assert!(unframe(&[]).unwrap().is_empty());
    }

    #[test]
    fn truncated_frame() {
        let framed = frame(&[vec![1u8, 2, 3]]).unwrap();
        let err = unframe(&framed[..2]).unwrap_err();

        assert_eq!(
            err.downcast_ref::<CodecError>(),
            Some(&CodecError::TruncatedFrame { length: 3, remaining: 1 })
        );
    }
}
