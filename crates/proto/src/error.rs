use thiserror::Error;

/// Failures in the framing, compression and cipher layers.
///
/// These are kept as a closed enum because the session needs to tell the
/// fatal cases (anything touching the cipher or the outer envelope) apart
/// from per-packet decode failures, which are logged and dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A sub-packet length prefix pointed past the end of the batch.
    #[error("sub-packet length {length} exceeds {remaining} remaining bytes")]
    TruncatedFrame { length: usize, remaining: usize },

    /// The batch carried a compression method byte this build does not know.
    #[error("unsupported compression method {0:#04x}")]
    UnsupportedCompression(u8),

    /// The trailing checksum of a received ciphertext did not match.
    #[error("encryption checksums do not match")]
    BadChecksum,

    /// A ciphertext was too short to contain a checksum.
    #[error("ciphertext of {0} bytes cannot contain a checksum")]
    CiphertextTooShort(usize),
}
