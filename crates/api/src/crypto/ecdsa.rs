//! ECDSA-P256-over-SHA-256 signing and verification, and the exact
//! byte-level message construction rules the protocol relies on.

use ecdsa::signature::{Signer as _, Verifier as _};
use p256::ecdsa::Signature;
pub use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Literal prefix prepended to a key-switched sender ciphertext before the
/// receiver signs it to accept an `unconfirmed` transaction. Must be
/// reproduced bit-exact; it is not followed by a separator.
pub const ACCEPT_PREFIX: &[u8] = b"ACCEPT";

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid DER-encoded public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid DER-encoded signature: {0}")]
    InvalidSignature(String),
}

pub fn generate_signing_key() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

pub fn sign(sk: &SigningKey, msg: &[u8]) -> Vec<u8> {
    let sig: Signature = sk.sign(msg);
    sig.to_der().as_bytes().to_vec()
}

pub fn verify(pk: &VerifyingKey, msg: &[u8], sig_der: &[u8]) -> bool {
    match Signature::from_der(sig_der) {
        Ok(sig) => pk.verify(msg, &sig).is_ok(),
        Err(_) => false,
    }
}

/// Build the exact message signed for a confirming-stage signature:
/// `"ACCEPT" || encode_ct(ctSender_after_key_switch)`.
pub fn accept_message(ct_sender_bytes: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(ACCEPT_PREFIX.len() + ct_sender_bytes.len());
    msg.extend_from_slice(ACCEPT_PREFIX);
    msg.extend_from_slice(ct_sender_bytes);
    msg
}

pub fn encode_public_key(pk: &VerifyingKey) -> Result<Vec<u8>, SignatureError> {
    pk.to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))
}

pub fn decode_public_key(der: &[u8]) -> Result<VerifyingKey, SignatureError> {
    VerifyingKey::from_public_key_der(der).map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let sk = generate_signing_key();
        let pk = *sk.verifying_key();
        let msg = b"transfer ciphertext bytes";
        let sig = sign(&sk, msg);
        assert!(verify(&pk, msg, &sig));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let sk = generate_signing_key();
        let pk = *sk.verifying_key();
        let sig = sign(&sk, b"original message");
        assert!(!verify(&pk, b"original-message", &sig));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let sk = generate_signing_key();
        let pk = *sk.verifying_key();
        let msg = b"payload";
        let mut sig = sign(&sk, msg);
        let last = sig.len() - 1;
        sig[last] ^= 0xFF;
        assert!(!verify(&pk, msg, &sig));
    }

    #[test]
    fn accept_message_has_literal_prefix() {
        let msg = accept_message(b"ct-bytes");
        assert_eq!(&msg[..6], b"ACCEPT");
        assert_eq!(&msg[6..], b"ct-bytes");
    }

    #[test]
    fn public_key_der_round_trips() {
        let sk = generate_signing_key();
        let pk = *sk.verifying_key();
        let der = encode_public_key(&pk).unwrap();
        let decoded = decode_public_key(&der).unwrap();
        assert_eq!(pk, decoded);
    }
}
