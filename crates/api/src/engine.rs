//! The transfer protocol state machine described in §4.4: verify, then
//! key-switch, then homomorphically update both balances, then record.
//!
//! Nothing is written to the store until the final, atomic
//! [`Store::commit_transfer`] call for the sender-PK and confirm paths, so
//! an aborted transfer never leaves a `processing` row behind — the
//! "mark failed on partial write" requirement from the spec's error design
//! is satisfied by construction rather than by an explicit failure-marking
//! step.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::crypto::ckks::{self, Params};
use crate::error::LedgerError;
use crate::fee;
use crate::locks::BalanceLocks;
use crate::models::{TransactionBuilder, TransactionPhase, TransactionRecord};
use crate::store::Store;
use crate::verify;

pub struct TransferEngine {
    store: Arc<dyn Store>,
    params: Params,
    locks: BalanceLocks,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn Store>, params: Params) -> Self {
        Self {
            store,
            params,
            locks: BalanceLocks::new(),
        }
    }

    #[instrument(skip(self, incoming), fields(sender = %incoming.sender, receipt = %incoming.receipt))]
    pub async fn create_by_sender_pk(&self, incoming: TransactionRecord) -> Result<TransactionRecord, LedgerError> {
        if incoming.sender == incoming.receipt {
            return Err(LedgerError::BadRequest("sender and receipt must differ".to_string()));
        }
        if incoming.ct_sender.is_empty() || incoming.sig_ct_sender.is_empty() {
            return Err(LedgerError::BadRequest(
                "ctSender and sigCtSender are required for a sender-PK transfer".to_string(),
            ));
        }
        if incoming.ct_sender_signed_by != incoming.sender {
            return Err(LedgerError::BadRequest(
                "ctSenderSignedBy must equal sender for a sender-PK transfer".to_string(),
            ));
        }

        self.store.get_user(incoming.sender).await?;
        self.store.get_user(incoming.receipt).await?;

        let mut builder = TransactionBuilder::from_record(incoming);
        builder.assign_uuid_if_absent();
        builder.set_phase(TransactionPhase::Processing);

        verify::classify_and_verify(builder.record(), self.store.as_ref()).await?;

        let sender_id = builder.record().sender;
        let receipt_id = builder.record().receipt;

        let swk_entry = self.store.get_switching_key(sender_id, receipt_id).await?;
        let swk = ckks::decode_switching_key(&swk_entry.key_material)?;
        let ct_sender = ckks::decode_ct(&builder.record().ct_sender)?;
        let ct_receipt = ckks::key_switch(&self.params, &ct_sender, &swk)?;
        builder.set_ct_receipt(ckks::encode_ct(&ct_receipt)?);

        let _guard = self.locks.lock_pair(sender_id, receipt_id).await;

        let sender_balance = ckks::decode_ct(&self.store.get_balance(sender_id).await?)?;
        let receipt_balance = ckks::decode_ct(&self.store.get_balance(receipt_id).await?)?;

        let sender_updated = ckks::ct_sub(&self.params, &sender_balance, &ct_sender);
        let receipt_updated = ckks::ct_add(&self.params, &receipt_balance, &ct_receipt);

        builder.mark_confirmed(Utc::now().timestamp());
        let record = builder.finish();

        self.store
            .commit_transfer(
                sender_id,
                ckks::encode_ct(&sender_updated)?,
                receipt_id,
                ckks::encode_ct(&receipt_updated)?,
                &record,
            )
            .await?;

        Ok(record)
    }

    #[instrument(skip(self, incoming), fields(sender = %incoming.sender, receipt = %incoming.receipt))]
    pub async fn create_by_receipt_pk(&self, incoming: TransactionRecord) -> Result<TransactionRecord, LedgerError> {
        if incoming.sender == incoming.receipt {
            return Err(LedgerError::BadRequest("sender and receipt must differ".to_string()));
        }
        if incoming.ct_receipt.is_empty() || incoming.sig_ct_receipt.is_empty() {
            return Err(LedgerError::BadRequest(
                "ctReceipt and sigCtReceipt are required for a receipt-PK transfer".to_string(),
            ));
        }
        if incoming.ct_receipt_signed_by != incoming.sender {
            return Err(LedgerError::BadRequest(
                "ctReceiptSignedBy must equal sender for a receipt-PK transfer".to_string(),
            ));
        }

        self.store.get_user(incoming.sender).await?;
        self.store.get_user(incoming.receipt).await?;

        let mut builder = TransactionBuilder::from_record(incoming);
        builder.assign_uuid_if_absent();
        builder.set_phase(TransactionPhase::Processing);

        verify::classify_and_verify(builder.record(), self.store.as_ref()).await?;

        let swk_entry = self
            .store
            .get_switching_key(builder.record().receipt, builder.record().sender)
            .await?;
        let swk = ckks::decode_switching_key(&swk_entry.key_material)?;
        let ct_receipt = ckks::decode_ct(&builder.record().ct_receipt)?;
        let ct_sender = ckks::key_switch(&self.params, &ct_receipt, &swk)?;
        builder.set_ct_sender(ckks::encode_ct(&ct_sender)?);

        builder.set_phase(TransactionPhase::Unconfirmed);
        let record = builder.finish();
        self.store.write_transaction(&record).await?;

        Ok(record)
    }

    #[instrument(skip(self, sig_ct_sender))]
    pub async fn confirm(&self, uuid: Uuid, sig_ct_sender: Vec<u8>) -> Result<TransactionRecord, LedgerError> {
        let stored = self.store.get_transaction(uuid).await?;
        if stored.confirming_phase != TransactionPhase::Unconfirmed {
            return Err(LedgerError::Protocol(format!(
                "transaction {uuid} is not in the unconfirmed phase (currently {})",
                stored.confirming_phase
            )));
        }

        let receipt_id = stored.receipt;
        let sender_id = stored.sender;

        let mut builder = TransactionBuilder::from_record(stored);
        builder.set_sig_ct_sender(sig_ct_sender, receipt_id);
        builder.set_phase(TransactionPhase::Processing);

        verify::classify_and_verify(builder.record(), self.store.as_ref()).await?;

        let _guard = self.locks.lock_pair(sender_id, receipt_id).await;

        let sender_balance = ckks::decode_ct(&self.store.get_balance(sender_id).await?)?;
        let receipt_balance = ckks::decode_ct(&self.store.get_balance(receipt_id).await?)?;
        let ct_sender = ckks::decode_ct(&builder.record().ct_sender)?;
        let ct_receipt = ckks::decode_ct(&builder.record().ct_receipt)?;

        let sender_updated = ckks::ct_sub(&self.params, &sender_balance, &ct_sender);
        let receipt_updated = ckks::ct_add(&self.params, &receipt_balance, &ct_receipt);

        builder.mark_confirmed(Utc::now().timestamp());
        let record = builder.finish();

        self.store
            .commit_transfer(
                sender_id,
                ckks::encode_ct(&sender_updated)?,
                receipt_id,
                ckks::encode_ct(&receipt_updated)?,
                &record,
            )
            .await?;

        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn reject(&self, uuid: Uuid) -> Result<TransactionRecord, LedgerError> {
        let stored = self.store.get_transaction(uuid).await?;
        if stored.confirming_phase != TransactionPhase::Unconfirmed {
            return Err(LedgerError::Protocol(format!(
                "transaction {uuid} is not in the unconfirmed phase (currently {})",
                stored.confirming_phase
            )));
        }

        let mut builder = TransactionBuilder::from_record(stored);
        builder.mark_rejected();
        let record = builder.finish();
        self.store.write_transaction(&record).await?;

        Ok(record)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn apply_fixed_fee(&self, ct: &ckks::Ciphertext, flat_fee: f64) -> ckks::Ciphertext {
        fee::calc_fixed_fee(&self.params, ct, flat_fee)
    }

    pub fn apply_rated_fee(&self, ct: &ckks::Ciphertext, rate: f64) -> ckks::Ciphertext {
        fee::calc_rated_fee(&self.params, ct, rate)
    }
}
