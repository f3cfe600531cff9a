//! Utilities for working with encryption, decryption and login tokens.

pub mod encrypt;
pub mod jwt;
pub mod keys;

pub use encrypt::Encryptor;
pub use jwt::{BedrockIdentity, HandshakeToken, VerifiedChain, MOJANG_PUBLIC_KEY};
pub use keys::KeyPair;

use sha2::{Digest, Sha256};

/// The fixed key-derivation salt: the UTF-8 bytes of the salt shaker
/// emoji, binding derived keys to this protocol.
pub const KEY_SALT: &[u8] = "\u{1f9c2}".as_bytes();

/// Derives the 256-bit symmetric key from an ECDH agreement.
///
/// Both sides compute `SHA-256(salt ∥ shared_secret)`; the first 16 bytes
/// double as the initial cipher IV.
pub fn derive_key(salt: &[u8], shared_secret: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(shared_secret);

    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salt_is_four_bytes() {
        assert_eq!(KEY_SALT, &[0xf0, 0x9f, 0xa7, 0x82]);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_key(KEY_SALT, &[1, 2, 3]);
        let b = derive_key(KEY_SALT, &[1, 2, 3]);
        let c = derive_key(KEY_SALT, &[1, 2, 4]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
