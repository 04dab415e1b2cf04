//! Persistence contract consumed by the transfer engine. `PgStore` is the
//! only production implementation; `tests/support` carries an in-memory
//! double for engine-level tests.

pub mod pg;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::models::{CkksKeyEntry, EcdsaKeyEntry, SwitchingKeyEntry, TransactionRecord, User};

#[async_trait]
pub trait Store: Send + Sync {
    async fn put_user(&self, user: &User, balance_ct: Vec<u8>) -> LedgerResult<()>;
    async fn get_user(&self, id: Uuid) -> LedgerResult<User>;

    async fn update_balance(&self, user_id: Uuid, ct: Vec<u8>) -> LedgerResult<()>;
    async fn get_balance(&self, user_id: Uuid) -> LedgerResult<Vec<u8>>;

    async fn put_ckks_public_key(&self, key: &CkksKeyEntry) -> LedgerResult<()>;
    async fn put_ecdsa_public_key(&self, key: &EcdsaKeyEntry) -> LedgerResult<()>;
    async fn get_ecdsa_public_key_by_user(&self, user_id: Uuid) -> LedgerResult<EcdsaKeyEntry>;
    async fn get_ckks_public_key_by_user(&self, user_id: Uuid) -> LedgerResult<CkksKeyEntry>;

    async fn put_switching_key(&self, key: &SwitchingKeyEntry) -> LedgerResult<()>;
    async fn get_switching_key(&self, user_in: Uuid, user_out: Uuid) -> LedgerResult<SwitchingKeyEntry>;

    async fn write_transaction(&self, tx: &TransactionRecord) -> LedgerResult<()>;
    async fn get_transaction(&self, uuid: Uuid) -> LedgerResult<TransactionRecord>;

    /// Atomically update both balances involved in a transfer and upsert
    /// the transaction row, so the caller's balance lock (see
    /// [`crate::locks::BalanceLocks`]) corresponds to exactly one store
    /// transaction per critical section.
    async fn commit_transfer(
        &self,
        sender_id: Uuid,
        sender_balance_ct: Vec<u8>,
        receipt_id: Uuid,
        receipt_balance_ct: Vec<u8>,
        tx: &TransactionRecord,
    ) -> LedgerResult<()>;
}
