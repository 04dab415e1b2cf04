//! Client-side helpers: build signed transfers, accept an unconfirmed
//! transaction, and decrypt whichever side of a stored transaction belongs
//! to the caller. These never touch the network directly; see
//! [`remote`] for the HTTP-calling layer used by the `ledger-client`
//! binary.

pub mod remote;

use rand::RngCore;
use uuid::Uuid;

use crate::crypto::ckks::{self, Ciphertext, Params, PublicKey, SecretKey};
use crate::crypto::ecdsa::{self, SigningKey, VerifyingKey};
use crate::error::LedgerError;
use crate::models::{TransactionBuilder, TransactionRecord};

/// A user's own key material, held client-side only. The server never sees
/// `ckks_sk`/`ecdsa_sk`.
pub struct ClientIdentity {
    pub user_id: Uuid,
    pub ckks_pk: PublicKey,
    pub ckks_sk: SecretKey,
    pub ecdsa_sk: SigningKey,
}

impl ClientIdentity {
    pub fn generate(params: &Params, user_id: Uuid, rng: &mut impl RngCore) -> Self {
        let (ckks_pk, ckks_sk) = ckks::KeyGenerator::key_pair(params, rng);
        let ecdsa_sk = ecdsa::generate_signing_key();
        Self {
            user_id,
            ckks_pk,
            ckks_sk,
            ecdsa_sk,
        }
    }

    pub fn ecdsa_pk(&self) -> VerifyingKey {
        *self.ecdsa_sk.verifying_key()
    }
}

/// Build a `create/bySenderPK` request body: encrypt `amount` under the
/// sender's own key, sign the resulting ciphertext bytes.
pub fn build_sender_pk_transfer(
    params: &Params,
    sender: &ClientIdentity,
    receipt_id: Uuid,
    amount: f64,
    rng: &mut impl RngCore,
) -> Result<TransactionRecord, LedgerError> {
    let ct = ckks::encrypt(params, &sender.ckks_pk, amount, rng);
    let ct_bytes = ckks::encode_ct(&ct)?;
    let sig = ecdsa::sign(&sender.ecdsa_sk, &ct_bytes);

    let mut builder = TransactionBuilder::new(sender.user_id, receipt_id);
    builder.set_ct_sender(ct_bytes);
    builder.set_sig_ct_sender(sig, sender.user_id);
    Ok(builder.finish())
}

/// Build a `create/byReceiptPK` request body: encrypt `amount` under the
/// receiver's public key, sign the resulting ciphertext bytes with the
/// sender's own ECDSA key.
pub fn build_receipt_pk_transfer(
    params: &Params,
    sender: &ClientIdentity,
    receipt_id: Uuid,
    receipt_ckks_pk: &PublicKey,
    amount: f64,
    rng: &mut impl RngCore,
) -> Result<TransactionRecord, LedgerError> {
    let ct = ckks::encrypt(params, receipt_ckks_pk, amount, rng);
    let ct_bytes = ckks::encode_ct(&ct)?;
    let sig = ecdsa::sign(&sender.ecdsa_sk, &ct_bytes);

    let mut builder = TransactionBuilder::new(sender.user_id, receipt_id);
    builder.set_ct_receipt(ct_bytes);
    builder.set_sig_ct_receipt(sig, sender.user_id);
    Ok(builder.finish())
}

/// Sign the acceptance message for a pending `unconfirmed` transaction.
pub fn build_accept(receiver: &ClientIdentity, ct_sender: &[u8]) -> Vec<u8> {
    let msg = ecdsa::accept_message(ct_sender);
    ecdsa::sign(&receiver.ecdsa_sk, &msg)
}

/// Decrypt whichever ciphertext in `tx` belongs to `identity`, based on
/// whether it is the sender or the receiver.
pub fn decrypt_own_side(identity: &ClientIdentity, params: &Params, tx: &TransactionRecord) -> Result<f64, LedgerError> {
    let bytes = if tx.sender == identity.user_id {
        &tx.ct_sender
    } else if tx.receipt == identity.user_id {
        &tx.ct_receipt
    } else {
        return Err(LedgerError::BadRequest(
            "identity is neither sender nor receipt on this transaction".to_string(),
        ));
    };
    let ct: Ciphertext = ckks::decode_ct(bytes)?;
    Ok(ckks::decrypt(params, &identity.ckks_sk, &ct))
}
