//! Per-channel AEAD, enabled once the PCP handshake (§4.6) has derived a
//! shared secret. Keeps the same key/IV-plus-counter nonce construction as
//! `s2n_quic_dc::crypto::awslc`, but against `ring` rather than `aws-lc-rs`
//! since that's the AEAD crate already used elsewhere in the pack.

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, NONCE_LEN};
use thiserror::Error;
use zeroize::Zeroize;

/// Errors sealing or opening a channel record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("aead key rejected the provided key material")]
    InvalidKey,
    #[error("aead tag did not verify")]
    InvalidTag,
    #[error("per-direction nonce counter exhausted")]
    CounterExhausted,
}

/// A derived per-direction key plus its base IV. Built separately for the
/// send and receive direction of a channel so each has its own nonce
/// counter (§4.6 "derived session keys").
pub struct DirectionalKey {
    key: LessSafeKey,
    iv: [u8; NONCE_LEN],
    counter: u64,
}

impl DirectionalKey {
    pub fn new(mut key_bytes: [u8; 32], iv: [u8; NONCE_LEN]) -> Result<Self, CryptoError> {
        let unbound = UnboundKey::new(&aead::AES_256_GCM, &key_bytes).map_err(|_| CryptoError::InvalidKey)?;
        key_bytes.zeroize();
        Ok(Self {
            key: LessSafeKey::new(unbound),
            iv,
            counter: 0,
        })
    }

    fn next_nonce(&mut self) -> Result<Nonce, CryptoError> {
        let counter = self.counter;
        self.counter = self.counter.checked_add(1).ok_or(CryptoError::CounterExhausted)?;
        let mut nonce_bytes = self.iv;
        for (byte, counter_byte) in nonce_bytes.iter_mut().rev().zip(counter.to_le_bytes()) {
            *byte ^= counter_byte;
        }
        Ok(Nonce::assume_unique_for_key(nonce_bytes))
    }

    /// Seals `payload_and_tag` in place; the slice must already have
    /// `aead::AES_256_GCM.tag_len()` trailing bytes reserved for the tag.
    pub fn seal_in_place(&mut self, header: &[u8], payload_and_tag: &mut Vec<u8>) -> Result<(), CryptoError> {
        let nonce = self.next_nonce()?;
        self.key
            .seal_in_place_append_tag(nonce, Aad::from(header), payload_and_tag)
            .map_err(|_| CryptoError::InvalidKey)
    }

    /// Opens an in-place record previously produced by [`Self::seal_in_place`].
    /// Returns the plaintext length (the tag is stripped on success).
    pub fn open_in_place<'a>(&mut self, header: &[u8], payload_and_tag: &'a mut [u8]) -> Result<&'a mut [u8], CryptoError> {
        let nonce = self.next_nonce()?;
        self.key
            .open_in_place(nonce, Aad::from(header), payload_and_tag)
            .map_err(|_| CryptoError::InvalidTag)
    }
}

/// A bidirectional cipher suite for one endpoint channel: independent
/// counters for the locally-initiated and remotely-initiated direction so
/// an ack-only peer never needs to skip nonces.
pub struct CipherSuite {
    pub send: DirectionalKey,
    pub recv: DirectionalKey,
}

impl CipherSuite {
    pub fn new(send: DirectionalKey, recv: DirectionalKey) -> Self {
        Self { send, recv }
    }
}
