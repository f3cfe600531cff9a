//! Whole-batch compression with a method-prefix byte.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::bedrock::CompressionAlgorithm;
use crate::CodecError;

/// Deflate level used for outgoing batches.
pub const COMPRESSION_LEVEL: u32 = 7;

/// The method byte leading a compressed batch when encryption is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Raw-deflate compressed payload.
    Flate,
    /// Snappy compressed payload.
    Snappy,
    /// No compression was applied; the payload is verbatim.
    NotPresent,
}

impl CompressionMethod {
    /// The wire value of this method.
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Flate => 0x00,
            Self::Snappy => 0x01,
            Self::NotPresent => 0xff,
        }
    }

    /// Parses a wire method byte.
    pub fn from_byte(byte: u8) -> anyhow::Result<Self> {
        Ok(match byte {
            0x00 => Self::Flate,
            0x01 => Self::Snappy,
            0xff => Self::NotPresent,
            other => return Err(CodecError::UnsupportedCompression(other).into()),
        })
    }
}

/// Compresses a framed batch with raw deflate.
pub fn deflate(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder =
        DeflateEncoder::new(Vec::new(), flate2::Compression::new(COMPRESSION_LEVEL));
    encoder.write_all(data)?;

    Ok(encoder.finish()?)
}

/// Decompresses a raw deflate stream.
pub fn inflate(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;

    Ok(decompressed)
}

/// Compresses a framed batch with snappy.
pub fn snappy_compress(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    Ok(snap::raw::Encoder::new().compress_vec(data)?)
}

/// Decompresses a snappy block.
pub fn snappy_decompress(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    Ok(snap::raw::Decoder::new().decompress_vec(data)?)
}

/// The negotiated compression settings of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    /// Algorithm announced in NetworkSettings.
    pub algorithm: CompressionAlgorithm,
    /// Batches at or below this size are carried verbatim.
    pub threshold: u16,
}

impl Compression {
    /// Compresses a framed batch according to the negotiated settings.
    ///
    /// Returns the method actually applied and the payload. Batches at or
    /// below the threshold are returned untouched with
    /// [`CompressionMethod::NotPresent`].
    pub fn compress(&self, framed: Vec<u8>) -> anyhow::Result<(CompressionMethod, Vec<u8>)> {
        if self.threshold == 0 || framed.len() <= self.threshold as usize {
            return Ok((CompressionMethod::NotPresent, framed));
        }

        Ok(match self.algorithm {
            CompressionAlgorithm::Flate => (CompressionMethod::Flate, deflate(&framed)?),
            CompressionAlgorithm::Snappy => (CompressionMethod::Snappy, snappy_compress(&framed)?),
        })
    }

    /// Reverses [`Compression::compress`] for a received method byte.
    pub fn decompress(method: CompressionMethod, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
        match method {
            CompressionMethod::Flate => inflate(payload),
            CompressionMethod::Snappy => snappy_decompress(payload),
            CompressionMethod::NotPresent => Ok(payload.to_vec()),
        }
    }
}

/// Inflates a batch that travelled without a method byte (the encrypted
/// path hides it). Payloads that are not a deflate stream are returned
/// verbatim.
pub fn inflate_or_passthrough(data: &[u8]) -> Vec<u8> {
    match inflate(data) {
        Ok(decompressed) => decompressed,
        Err(_) => data.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_roundtrip() {
        let data = vec![0x2a; 4096];
        let compressed = deflate(&data).unwrap();

        assert!(compressed.len() < data.len());
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn snappy_roundtrip() {
        let data = b"a very compressible payload, a very compressible payload".to_vec();
        let compressed = snappy_compress(&data).unwrap();

        assert_eq!(snappy_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn threshold_respected() {
        let compression =
            Compression { algorithm: CompressionAlgorithm::Flate, threshold: 512 };

        let small = vec![1u8; 400];
        let (method, payload) = compression.compress(small.clone()).unwrap();
        assert_eq!(method, CompressionMethod::NotPresent);
        assert_eq!(payload, small);

        let large = vec![1u8; 2048];
        let (method, payload) = compression.compress(large.clone()).unwrap();
        assert_eq!(method, CompressionMethod::Flate);
        assert_eq!(Compression::decompress(method, &payload).unwrap(), large);
    }

    #[test]
    fn unsupported_method_byte() {
        let err = CompressionMethod::from_byte(0x42).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CodecError>(),
            Some(&CodecError::UnsupportedCompression(0x42))
        );
    }

    #[test]
    fn passthrough_detects_non_deflate() {
        let framed = vec![0x02, 0xaa, 0xbb];
        assert_eq!(inflate_or_passthrough(&framed), framed);

        let compressed = deflate(&[0x55; 1024]).unwrap();
        assert_eq!(inflate_or_passthrough(&compressed), vec![0x55; 1024]);
    }
}
