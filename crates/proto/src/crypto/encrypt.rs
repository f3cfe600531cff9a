use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::CodecError;

/// Length of the checksum trailing every encrypted payload.
pub const CHECKSUM_LEN: usize = 8;

/// One direction of the CFB8 stream.
///
/// The shift register is seeded with the first 16 bytes of the key and
/// then carries over from message to message, so each message continues
/// the same cipher stream.
struct CipherState {
    cipher: Aes256,
    key: [u8; 32],
    register: [u8; 16],
    counter: u64,
}

impl CipherState {
    fn new(key: [u8; 32]) -> Self {
        let cipher = Aes256::new(&key.into());

        let mut register = [0; 16];
        register.copy_from_slice(&key[..16]);

        Self { cipher, key, register, counter: 0 }
    }

    fn keystream_byte(&self) -> u8 {
        let mut block = self.register.into();
        self.cipher.encrypt_block(&mut block);
        block[0]
    }

    fn shift_in(&mut self, ciphertext_byte: u8) {
        self.register.copy_within(1.., 0);
        self.register[15] = ciphertext_byte;
    }

    fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data {
            let encrypted = *byte ^ self.keystream_byte();
            self.shift_in(encrypted);
            *byte = encrypted;
        }
    }

    fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data {
            let decrypted = *byte ^ self.keystream_byte();
            self.shift_in(*byte);
            *byte = decrypted;
        }
    }

    /// First 8 bytes of `SHA-256(counter_le ∥ payload ∥ key)`.
    fn checksum(&self, counter: u64, payload: &[u8]) -> [u8; CHECKSUM_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_le_bytes());
        hasher.update(payload);
        hasher.update(self.key);

        let digest = hasher.finalize();
        let mut checksum = [0; CHECKSUM_LEN];
        checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
        checksum
    }
}

impl Drop for CipherState {
    fn drop(&mut self) {
        self.key = [0; 32];
        self.register = [0; 16];
    }
}

fn constant_time_eq(a: &[u8; CHECKSUM_LEN], b: &[u8; CHECKSUM_LEN]) -> bool {
    let mut difference = 0;
    for (x, y) in a.iter().zip(b) {
        difference |= x ^ y;
    }

    difference == 0
}

/// The symmetric cipher of a session.
///
/// A session owns exactly one encryptor holding both directions; the
/// send and receive streams share the key but evolve independently.
pub struct Encryptor {
    send: Mutex<CipherState>,
    recv: Mutex<CipherState>,
}

impl Encryptor {
    /// Creates an encryptor from the derived 256-bit secret hash.
    pub fn new(key: [u8; 32]) -> Self {
        Self { send: Mutex::new(CipherState::new(key)), recv: Mutex::new(CipherState::new(key)) }
    }

    /// Encrypts one outgoing payload, appending its checksum.
    pub fn encrypt(&self, mut payload: Vec<u8>) -> Vec<u8> {
        let mut state = self.send.lock();

        let counter = state.counter;
        let checksum = state.checksum(counter, &payload);
        payload.extend_from_slice(&checksum);

        state.encrypt(&mut payload);
        state.counter += 1;

        payload
    }

    /// Decrypts one incoming ciphertext and verifies its checksum.
    ///
    /// A checksum mismatch leaves the stream in an unknown state and must
    /// terminate the session.
    pub fn decrypt(&self, mut ciphertext: Vec<u8>) -> anyhow::Result<Vec<u8>> {
        let mut state = self.recv.lock();

        if ciphertext.len() < CHECKSUM_LEN {
            return Err(CodecError::CiphertextTooShort(ciphertext.len()).into());
        }

        state.decrypt(&mut ciphertext);

        let body_len = ciphertext.len() - CHECKSUM_LEN;
        let mut received = [0; CHECKSUM_LEN];
        received.copy_from_slice(&ciphertext[body_len..]);

        let counter = state.counter;
        let expected = state.checksum(counter, &ciphertext[..body_len]);
        if !constant_time_eq(&received, &expected) {
            return Err(CodecError::BadChecksum.into());
        }

        state.counter += 1;
        ciphertext.truncate(body_len);
        Ok(ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn roundtrip() {
        let alice = Encryptor::new(KEY);
        let bob = Encryptor::new(KEY);

        let plaintext = b"the quick brown fox".to_vec();
        let ciphertext = alice.encrypt(plaintext.clone());

        assert_ne!(&ciphertext[..plaintext.len()], plaintext.as_slice());
        assert_eq!(bob.decrypt(ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn stream_continues_across_messages() {
        let alice = Encryptor::new(KEY);
        let bob = Encryptor::new(KEY);

        for index in 0..100u32 {
            let plaintext = index.to_le_bytes().to_vec();
            let decrypted = bob.decrypt(alice.encrypt(plaintext.clone())).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn tampering_fails_the_checksum() {
        let alice = Encryptor::new(KEY);
        let bob = Encryptor::new(KEY);

        let mut ciphertext = alice.encrypt(b"payload".to_vec());
        ciphertext[3] ^= 0x01;

        let err = bob.decrypt(ciphertext).unwrap_err();
        assert_eq!(err.downcast_ref::<CodecError>(), Some(&CodecError::BadChecksum));
    }

    #[test]
    fn replay_fails_the_checksum() {
        let alice = Encryptor::new(KEY);
        let bob = Encryptor::new(KEY);

        let ciphertext = alice.encrypt(b"once".to_vec());
        assert!(bob.decrypt(ciphertext.clone()).is_ok());

        // The receive counter has advanced, a replayed ciphertext is
        // rejected.
        assert!(bob.decrypt(ciphertext).is_err());
    }

    #[test]
    fn directions_are_independent() {
        let alice = Encryptor::new(KEY);
        let bob = Encryptor::new(KEY);

        let from_alice = alice.encrypt(b"to bob".to_vec());
        let from_bob = bob.encrypt(b"to alice".to_vec());

        assert_eq!(bob.decrypt(from_alice).unwrap(), b"to bob");
        assert_eq!(alice.decrypt(from_bob).unwrap(), b"to alice");
    }

    #[test]
    fn short_ciphertext_is_rejected() {
        let bob = Encryptor::new(KEY);
        let err = bob.decrypt(vec![1, 2, 3]).unwrap_err();

        assert_eq!(err.downcast_ref::<CodecError>(), Some(&CodecError::CiphertextTooShort(3)));
    }
}
