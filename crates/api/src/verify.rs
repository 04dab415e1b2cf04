//! Signature-path dispatcher. Operates purely on the byte strings already
//! decoded onto a `TransactionRecord` — no runtime dispatch between a
//! ciphertext value and its byte form, per the design note against
//! `interface{}`-style inspection.

use crate::crypto::ecdsa;
use crate::error::LedgerError;
use crate::models::TransactionRecord;
use crate::store::Store;

pub async fn classify_and_verify(tx: &TransactionRecord, store: &dyn Store) -> Result<(), LedgerError> {
    if tx.ct_sender_signed_by == tx.sender {
        let signer_key = store.get_ecdsa_public_key_by_user(tx.sender).await?;
        let pk = ecdsa::decode_public_key(&signer_key.public_key)
            .map_err(|e| LedgerError::Crypto(e.to_string()))?;
        return require(ecdsa::verify(&pk, &tx.ct_sender, &tx.sig_ct_sender));
    }

    if tx.ct_receipt_signed_by == tx.sender && tx.sig_ct_sender.is_empty() {
        let signer_key = store.get_ecdsa_public_key_by_user(tx.sender).await?;
        let pk = ecdsa::decode_public_key(&signer_key.public_key)
            .map_err(|e| LedgerError::Crypto(e.to_string()))?;
        return require(ecdsa::verify(&pk, &tx.ct_receipt, &tx.sig_ct_receipt));
    }

    if !tx.sig_ct_sender.is_empty() && !tx.sig_ct_receipt.is_empty() {
        let signer_key = store.get_ecdsa_public_key_by_user(tx.ct_sender_signed_by).await?;
        let pk = ecdsa::decode_public_key(&signer_key.public_key)
            .map_err(|e| LedgerError::Crypto(e.to_string()))?;
        let msg = ecdsa::accept_message(&tx.ct_sender);
        return require(ecdsa::verify(&pk, &msg, &tx.sig_ct_sender));
    }

    Err(LedgerError::Protocol("unknown signature configuration".to_string()))
}

fn require(ok: bool) -> Result<(), LedgerError> {
    if ok {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized("signature verification failed".to_string()))
    }
}
