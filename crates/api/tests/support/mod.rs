//! In-memory `Store` test double, used so transfer-engine tests don't need
//! a real Postgres instance.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use ledger_api::error::{LedgerError, LedgerResult};
use ledger_api::models::{CkksKeyEntry, EcdsaKeyEntry, SwitchingKeyEntry, TransactionRecord, User};
use ledger_api::store::Store;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    balances: HashMap<Uuid, Vec<u8>>,
    switching_keys: HashMap<(Uuid, Uuid), SwitchingKeyEntry>,
    transactions: HashMap<Uuid, TransactionRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_user(&self, user: &User, balance_ct: Vec<u8>) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.balances.entry(user.id).or_insert(balance_ct);
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> LedgerResult<User> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("user {id} not found")))
    }

    async fn update_balance(&self, user_id: Uuid, ct: Vec<u8>) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.balances.insert(user_id, ct);
        Ok(())
    }

    async fn get_balance(&self, user_id: Uuid) -> LedgerResult<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner
            .balances
            .get(&user_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("balance for user {user_id} not found")))
    }

    async fn put_ckks_public_key(&self, key: &CkksKeyEntry) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&key.user_id) {
            user.ckks_keys.push(key.clone());
        }
        Ok(())
    }

    async fn put_ecdsa_public_key(&self, key: &EcdsaKeyEntry) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&key.user_id) {
            user.ecdsa_keys.push(key.clone());
        }
        Ok(())
    }

    async fn get_ecdsa_public_key_by_user(&self, user_id: Uuid) -> LedgerResult<EcdsaKeyEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .get(&user_id)
            .and_then(|u| u.primary_ecdsa_key())
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("ecdsa key for user {user_id} not found")))
    }

    async fn get_ckks_public_key_by_user(&self, user_id: Uuid) -> LedgerResult<CkksKeyEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .get(&user_id)
            .and_then(|u| u.primary_ckks_key())
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("ckks key for user {user_id} not found")))
    }

    async fn put_switching_key(&self, key: &SwitchingKeyEntry) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .switching_keys
            .insert((key.user_in, key.user_out), key.clone());
        Ok(())
    }

    async fn get_switching_key(&self, user_in: Uuid, user_out: Uuid) -> LedgerResult<SwitchingKeyEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .switching_keys
            .get(&(user_in, user_out))
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("switching key {user_in}->{user_out} not found")))
    }

    async fn write_transaction(&self, tx: &TransactionRecord) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.transactions.insert(tx.uuid, tx.clone());
        Ok(())
    }

    async fn get_transaction(&self, uuid: Uuid) -> LedgerResult<TransactionRecord> {
        let inner = self.inner.lock().unwrap();
        inner
            .transactions
            .get(&uuid)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {uuid} not found")))
    }

    async fn commit_transfer(
        &self,
        sender_id: Uuid,
        sender_balance_ct: Vec<u8>,
        receipt_id: Uuid,
        receipt_balance_ct: Vec<u8>,
        tx: &TransactionRecord,
    ) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.balances.insert(sender_id, sender_balance_ct);
        inner.balances.insert(receipt_id, receipt_balance_ct);
        inner.transactions.insert(tx.uuid, tx.clone());
        Ok(())
    }
}
