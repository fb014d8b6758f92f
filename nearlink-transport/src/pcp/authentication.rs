//! The 4-message authentication handshake (§4.6): a pluggable sub-state,
//! consistent with §9's "exact handshake/cipher ... not exposed; treat as
//! a pluggable sub-state with the contract 'produces session keys or
//! fails'" and §1's "cryptographic primitives consumed as a library".
//!
//! Runs over the channel's raw length-prefixed framing rather than the
//! `OfflineFrame` codec: the handshake's own wire shape is explicitly out
//! of scope (§1), so it is free to use whatever byte layout its
//! implementation wants.

use crate::channel::{ChannelError, EndpointChannel, EndpointSocket};
use crate::crypto::{CipherSuite, DirectionalKey};
use ring::agreement::{self, EphemeralPrivateKey, UnparsedPublicKey, X25519};
use ring::hkdf::{Prk, Salt, HKDF_SHA256};
use ring::rand::SystemRandom;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("channel error during handshake: {0}")]
    Channel(#[from] ChannelError),
    #[error("peer's handshake message had the wrong length")]
    MalformedMessage,
    #[error("key agreement failed")]
    KeyAgreement,
}

/// Produces session keys for a freshly opened channel, or fails. The core
/// neither defines nor inspects the bytes this exchanges; it only calls
/// `initiate`/`respond` and installs the resulting [`CipherSuite`] on the
/// channel once authentication succeeds.
pub trait Authenticator: Send + Sync {
    fn initiate<S: EndpointSocket>(&self, channel: &EndpointChannel<S>) -> Result<CipherSuite, AuthenticationError>;
    fn respond<S: EndpointSocket>(&self, channel: &EndpointChannel<S>) -> Result<CipherSuite, AuthenticationError>;
}

/// Default implementation: an ephemeral X25519 ECDH exchange followed by
/// HKDF-SHA256 to derive independent per-direction AES-256-GCM keys, the
/// same primitive combination `s2n-quic-dc`'s `path::secret` module uses
/// (ECDH handshake, HKDF-derived directional keys).
pub struct EcdhAuthenticator;

impl EcdhAuthenticator {
    fn exchange<S: EndpointSocket>(channel: &EndpointChannel<S>, send_first: bool) -> Result<Vec<u8>, AuthenticationError> {
        let rng = SystemRandom::new();
        let private_key =
            EphemeralPrivateKey::generate(&X25519, &rng).map_err(|_| AuthenticationError::KeyAgreement)?;
        let public_key = private_key.compute_public_key().map_err(|_| AuthenticationError::KeyAgreement)?;

        let peer_public_bytes = if send_first {
            channel.write_raw(public_key.as_ref())?;
            channel.read_raw()?
        } else {
            let peer_bytes = channel.read_raw()?;
            channel.write_raw(public_key.as_ref())?;
            peer_bytes
        };

        if peer_public_bytes.len() != 32 {
            return Err(AuthenticationError::MalformedMessage);
        }
        let peer_public = UnparsedPublicKey::new(&X25519, peer_public_bytes);
        agreement::agree_ephemeral(private_key, &peer_public, |material| material.to_vec())
            .map_err(|_| AuthenticationError::KeyAgreement)
    }
}

impl Authenticator for EcdhAuthenticator {
    fn initiate<S: EndpointSocket>(&self, channel: &EndpointChannel<S>) -> Result<CipherSuite, AuthenticationError> {
        let shared_secret = Self::exchange(channel, true)?;
        derive_cipher_suite(&shared_secret, true)
    }

    fn respond<S: EndpointSocket>(&self, channel: &EndpointChannel<S>) -> Result<CipherSuite, AuthenticationError> {
        let shared_secret = Self::exchange(channel, false)?;
        derive_cipher_suite(&shared_secret, false)
    }
}

fn derive_cipher_suite(shared_secret: &[u8], is_initiator: bool) -> Result<CipherSuite, AuthenticationError> {
    let salt = Salt::new(HKDF_SHA256, b"nearlink-pcp-handshake");
    let prk = salt.extract(shared_secret);

    let mut initiator_key = [0u8; 32];
    let mut responder_key = [0u8; 32];
    expand(&prk, b"nearlink initiator->responder", &mut initiator_key)?;
    expand(&prk, b"nearlink responder->initiator", &mut responder_key)?;

    let iv = [0u8; 12];
    let (send_key, recv_key) = if is_initiator {
        (initiator_key, responder_key)
    } else {
        (responder_key, initiator_key)
    };

    let send = DirectionalKey::new(send_key, iv).map_err(|_| AuthenticationError::KeyAgreement)?;
    let recv = DirectionalKey::new(recv_key, iv).map_err(|_| AuthenticationError::KeyAgreement)?;
    Ok(CipherSuite::new(send, recv))
}

fn expand(prk: &Prk, info: &[u8], out: &mut [u8; 32]) -> Result<(), AuthenticationError> {
    let okm = prk.expand(&[info], HKDF_SHA256).map_err(|_| AuthenticationError::KeyAgreement)?;
    okm.fill(out).map_err(|_| AuthenticationError::KeyAgreement)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;

    #[test]
    fn initiator_and_responder_derive_matching_directional_keys() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let responder_thread = std::thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let channel = Arc::new(EndpointChannel::new(socket));
            EcdhAuthenticator.respond(&channel).unwrap()
        });

        let initiator_socket = TcpStream::connect(addr).unwrap();
        let initiator_channel = Arc::new(EndpointChannel::new(initiator_socket));
        let initiator_cipher = EcdhAuthenticator.initiate(&initiator_channel).unwrap();
        let responder_cipher = responder_thread.join().unwrap();

        let mut initiator_sealer = initiator_cipher.send;
        let mut responder_opener = responder_cipher.recv;
        let mut buf = b"hello".to_vec();
        initiator_sealer.seal_in_place(b"h", &mut buf).unwrap();
        let plaintext = responder_opener.open_in_place(b"h", &mut buf).unwrap();
        assert_eq!(plaintext, b"hello");
    }
}
