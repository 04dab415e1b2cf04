use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use uuid::Uuid;

use crate::error::LedgerError;

/// A user's primary-indexed key chains and display name. Only index 0 of
/// each chain is addressed by the protocol; the vector shape is
/// future-proofing for key rotation, per the spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub ckks_keys: Vec<CkksKeyEntry>,
    pub ecdsa_keys: Vec<EcdsaKeyEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn primary_ckks_key(&self) -> Option<&CkksKeyEntry> {
        self.ckks_keys.first()
    }

    pub fn primary_ecdsa_key(&self) -> Option<&EcdsaKeyEntry> {
        self.ecdsa_keys.first()
    }
}

/// A CKKS key chain entry. The server never stores the secret key half;
/// `public_key` holds the `bincode`-encoded CKKS public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CkksKeyEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub public_key: Vec<u8>,
}

/// An ECDSA-P256 key chain entry. `public_key` holds the PKIX DER encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcdsaKeyEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub public_key: Vec<u8>,
}

/// A registered switching key, keyed by the ordered pair `(user_in,
/// user_out)`. Switching keys are generated client-side by whoever holds
/// both secret keys and merely registered here; the server cannot derive
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchingKeyEntry {
    pub id: Uuid,
    pub user_in: Uuid,
    pub user_out: Uuid,
    pub pk_in: Option<Uuid>,
    pub pk_out: Option<Uuid>,
    pub key_material: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionPhase {
    Unconfirmed,
    Waiting,
    Processing,
    Rejected,
    Confirmed,
    Failed,
}

impl std::fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionPhase::Unconfirmed => "unconfirmed",
            TransactionPhase::Waiting => "waiting",
            TransactionPhase::Processing => "processing",
            TransactionPhase::Rejected => "rejected",
            TransactionPhase::Confirmed => "confirmed",
            TransactionPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The immutable persisted record of a transfer. Fields beyond the phase
/// and in-flight ciphertexts never change once written; the confirming
/// stage rewrites `sig_ct_sender`/`ct_sender_signed_by` exactly once on its
/// way from `unconfirmed` to `confirmed`, per the protocol in §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub confirming_phase: TransactionPhase,
    pub uuid: Uuid,
    pub sender: Uuid,
    pub receipt: Uuid,
    pub ct_sender: Vec<u8>,
    pub ct_receipt: Vec<u8>,
    pub sig_ct_sender: Vec<u8>,
    pub ct_sender_signed_by: Uuid,
    pub sig_ct_receipt: Vec<u8>,
    pub ct_receipt_signed_by: Uuid,
    pub timestamp: i64,
    pub is_valid: bool,
}

impl TransactionRecord {
    pub fn builder(self) -> TransactionBuilder {
        TransactionBuilder(self)
    }
}

/// In-flight counterpart of `TransactionRecord`, mutated across the steps
/// of the transfer protocol. `finish()` yields the record that is actually
/// written to the store. Keeping these as distinct types (rather than one
/// struct serving both roles, as the original implementation does) means a
/// half-populated transaction can never be mistaken for a persisted one.
pub struct TransactionBuilder(TransactionRecord);

impl TransactionBuilder {
    pub fn new(sender: Uuid, receipt: Uuid) -> Self {
        TransactionBuilder(TransactionRecord {
            confirming_phase: TransactionPhase::Processing,
            uuid: Uuid::nil(),
            sender,
            receipt,
            ct_sender: Vec::new(),
            ct_receipt: Vec::new(),
            sig_ct_sender: Vec::new(),
            ct_sender_signed_by: Uuid::nil(),
            sig_ct_receipt: Vec::new(),
            ct_receipt_signed_by: Uuid::nil(),
            timestamp: 0,
            is_valid: false,
        })
    }

    pub fn from_record(record: TransactionRecord) -> Self {
        TransactionBuilder(record)
    }

    pub fn uuid(&self) -> Uuid {
        self.0.uuid
    }

    pub fn assign_uuid_if_absent(&mut self) {
        if self.0.uuid.is_nil() {
            self.0.uuid = Uuid::new_v4();
        }
    }

    pub fn set_phase(&mut self, phase: TransactionPhase) {
        self.0.confirming_phase = phase;
    }

    pub fn phase(&self) -> TransactionPhase {
        self.0.confirming_phase
    }

    pub fn set_ct_sender(&mut self, bytes: Vec<u8>) {
        self.0.ct_sender = bytes;
    }

    pub fn set_ct_receipt(&mut self, bytes: Vec<u8>) {
        self.0.ct_receipt = bytes;
    }

    pub fn set_sig_ct_sender(&mut self, sig: Vec<u8>, signed_by: Uuid) {
        self.0.sig_ct_sender = sig;
        self.0.ct_sender_signed_by = signed_by;
    }

    pub fn set_sig_ct_receipt(&mut self, sig: Vec<u8>, signed_by: Uuid) {
        self.0.sig_ct_receipt = sig;
        self.0.ct_receipt_signed_by = signed_by;
    }

    pub fn mark_confirmed(&mut self, now: i64) {
        self.0.confirming_phase = TransactionPhase::Confirmed;
        self.0.timestamp = now;
        self.0.is_valid = true;
    }

    /// Phase left as `failed` with a zero timestamp, per the spec's Open
    /// Question resolution (the original leaves this undefined).
    pub fn mark_failed(&mut self) {
        self.0.confirming_phase = TransactionPhase::Failed;
        self.0.timestamp = 0;
    }

    pub fn mark_rejected(&mut self) {
        self.0.confirming_phase = TransactionPhase::Rejected;
    }

    pub fn record(&self) -> &TransactionRecord {
        &self.0
    }

    pub fn finish(self) -> TransactionRecord {
        self.0
    }
}

/// Wire-format mirror of `TransactionRecord` with every byte field encoded
/// as standard base64, per the spec's field-exact JSON contract.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionJson {
    pub confirming_phase: TransactionPhase,
    pub uuid: Uuid,
    pub sender: Uuid,
    pub receipt: Uuid,
    #[serde_as(as = "Base64")]
    pub ct_sender: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub ct_receipt: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub sig_ct_sender: Vec<u8>,
    pub ct_sender_signed_by: Uuid,
    #[serde(rename = "sigCTReceipt")]
    #[serde_as(as = "Base64")]
    pub sig_ct_receipt: Vec<u8>,
    pub ct_receipt_signed_by: Uuid,
    pub timestamp: i64,
    pub is_valid: bool,
}

impl From<&TransactionRecord> for TransactionJson {
    fn from(t: &TransactionRecord) -> Self {
        TransactionJson {
            confirming_phase: t.confirming_phase,
            uuid: t.uuid,
            sender: t.sender,
            receipt: t.receipt,
            ct_sender: t.ct_sender.clone(),
            ct_receipt: t.ct_receipt.clone(),
            sig_ct_sender: t.sig_ct_sender.clone(),
            ct_sender_signed_by: t.ct_sender_signed_by,
            sig_ct_receipt: t.sig_ct_receipt.clone(),
            ct_receipt_signed_by: t.ct_receipt_signed_by,
            timestamp: t.timestamp,
            is_valid: t.is_valid,
        }
    }
}

impl TryFrom<TransactionJson> for TransactionRecord {
    type Error = LedgerError;

    fn try_from(j: TransactionJson) -> Result<Self, Self::Error> {
        Ok(TransactionRecord {
            confirming_phase: j.confirming_phase,
            uuid: j.uuid,
            sender: j.sender,
            receipt: j.receipt,
            ct_sender: j.ct_sender,
            ct_receipt: j.ct_receipt,
            sig_ct_sender: j.sig_ct_sender,
            ct_sender_signed_by: j.ct_sender_signed_by,
            sig_ct_receipt: j.sig_ct_receipt,
            ct_receipt_signed_by: j.ct_receipt_signed_by,
            timestamp: j.timestamp,
            is_valid: j.is_valid,
        })
    }
}
