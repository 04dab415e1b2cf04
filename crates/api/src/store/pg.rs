use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, prelude::FromRow};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::{CkksKeyEntry, EcdsaKeyEntry, SwitchingKeyEntry, TransactionPhase, TransactionRecord, User};

use super::Store;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CkksKeyRow {
    id: Uuid,
    user_id: Uuid,
    public_key: Vec<u8>,
}

impl From<CkksKeyRow> for CkksKeyEntry {
    fn from(r: CkksKeyRow) -> Self {
        CkksKeyEntry {
            id: r.id,
            user_id: r.user_id,
            public_key: r.public_key,
        }
    }
}

#[derive(FromRow)]
struct EcdsaKeyRow {
    id: Uuid,
    user_id: Uuid,
    public_key: Vec<u8>,
}

impl From<EcdsaKeyRow> for EcdsaKeyEntry {
    fn from(r: EcdsaKeyRow) -> Self {
        EcdsaKeyEntry {
            id: r.id,
            user_id: r.user_id,
            public_key: r.public_key,
        }
    }
}

#[derive(FromRow)]
struct SwitchingKeyRow {
    id: Uuid,
    user_in: Uuid,
    user_out: Uuid,
    pk_in: Option<Uuid>,
    pk_out: Option<Uuid>,
    key_material: Vec<u8>,
}

impl From<SwitchingKeyRow> for SwitchingKeyEntry {
    fn from(r: SwitchingKeyRow) -> Self {
        SwitchingKeyEntry {
            id: r.id,
            user_in: r.user_in,
            user_out: r.user_out,
            pk_in: r.pk_in,
            pk_out: r.pk_out,
            key_material: r.key_material,
        }
    }
}

#[derive(FromRow)]
struct TransactionRow {
    confirming_phase: String,
    uuid: Uuid,
    sender: Uuid,
    receipt: Uuid,
    ct_sender: Vec<u8>,
    ct_receipt: Vec<u8>,
    sig_ct_sender: Vec<u8>,
    ct_sender_signed_by: Uuid,
    sig_ct_receipt: Vec<u8>,
    ct_receipt_signed_by: Uuid,
    timestamp: i64,
    is_valid: bool,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = LedgerError;

    fn try_from(r: TransactionRow) -> Result<Self, Self::Error> {
        let confirming_phase = match r.confirming_phase.as_str() {
            "unconfirmed" => TransactionPhase::Unconfirmed,
            "waiting" => TransactionPhase::Waiting,
            "processing" => TransactionPhase::Processing,
            "rejected" => TransactionPhase::Rejected,
            "confirmed" => TransactionPhase::Confirmed,
            "failed" => TransactionPhase::Failed,
            other => {
                return Err(LedgerError::Storage(format!(
                    "unrecognized transaction phase in storage: {other}"
                )));
            }
        };
        Ok(TransactionRecord {
            confirming_phase,
            uuid: r.uuid,
            sender: r.sender,
            receipt: r.receipt,
            ct_sender: r.ct_sender,
            ct_receipt: r.ct_receipt,
            sig_ct_sender: r.sig_ct_sender,
            ct_sender_signed_by: r.ct_sender_signed_by,
            sig_ct_receipt: r.sig_ct_receipt,
            ct_receipt_signed_by: r.ct_receipt_signed_by,
            timestamp: r.timestamp,
            is_valid: r.is_valid,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn put_user(&self, user: &User, balance_ct: Vec<u8>) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO balances (user_id, ct)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&balance_ct)
        .execute(&mut *tx)
        .await?;

        for key in &user.ckks_keys {
            put_ckks_key_tx(&mut tx, key).await?;
        }
        for key in &user.ecdsa_keys {
            put_ecdsa_key_tx(&mut tx, key).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<User, LedgerError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT id, name, created_at, updated_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let row = row.ok_or_else(|| LedgerError::NotFound(format!("user {id} not found")))?;

        let ckks_rows: Vec<CkksKeyRow> =
            sqlx::query_as("SELECT id, user_id, public_key FROM ckks_keys WHERE user_id = $1 ORDER BY created_at")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        let ecdsa_rows: Vec<EcdsaKeyRow> =
            sqlx::query_as("SELECT id, user_id, public_key FROM ecdsa_keys WHERE user_id = $1 ORDER BY created_at")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        Ok(User {
            id: row.id,
            name: row.name,
            ckks_keys: ckks_rows.into_iter().map(Into::into).collect(),
            ecdsa_keys: ecdsa_rows.into_iter().map(Into::into).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn update_balance(&self, user_id: Uuid, ct: Vec<u8>) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, ct)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET ct = EXCLUDED.ct
            "#,
        )
        .bind(user_id)
        .bind(&ct)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_balance(&self, user_id: Uuid) -> Result<Vec<u8>, LedgerError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT ct FROM balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(ct,)| ct)
            .ok_or_else(|| LedgerError::NotFound(format!("balance for user {user_id} not found")))
    }

    async fn put_ckks_public_key(&self, key: &CkksKeyEntry) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        put_ckks_key_tx(&mut conn, key).await
    }

    async fn put_ecdsa_public_key(&self, key: &EcdsaKeyEntry) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        put_ecdsa_key_tx(&mut conn, key).await
    }

    async fn get_ecdsa_public_key_by_user(&self, user_id: Uuid) -> Result<EcdsaKeyEntry, LedgerError> {
        let row: Option<EcdsaKeyRow> = sqlx::query_as(
            "SELECT id, user_id, public_key FROM ecdsa_keys WHERE user_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into)
            .ok_or_else(|| LedgerError::NotFound(format!("ecdsa key for user {user_id} not found")))
    }

    async fn get_ckks_public_key_by_user(&self, user_id: Uuid) -> Result<CkksKeyEntry, LedgerError> {
        let row: Option<CkksKeyRow> = sqlx::query_as(
            "SELECT id, user_id, public_key FROM ckks_keys WHERE user_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into)
            .ok_or_else(|| LedgerError::NotFound(format!("ckks key for user {user_id} not found")))
    }

    async fn put_switching_key(&self, key: &SwitchingKeyEntry) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO switching_keys (id, user_in, user_out, pk_in, pk_out, key_material)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_in, user_out) DO UPDATE SET
                pk_in = EXCLUDED.pk_in,
                pk_out = EXCLUDED.pk_out,
                key_material = EXCLUDED.key_material
            "#,
        )
        .bind(key.id)
        .bind(key.user_in)
        .bind(key.user_out)
        .bind(key.pk_in)
        .bind(key.pk_out)
        .bind(&key.key_material)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_switching_key(&self, user_in: Uuid, user_out: Uuid) -> Result<SwitchingKeyEntry, LedgerError> {
        let row: Option<SwitchingKeyRow> = sqlx::query_as(
            "SELECT id, user_in, user_out, pk_in, pk_out, key_material FROM switching_keys WHERE user_in = $1 AND user_out = $2",
        )
        .bind(user_in)
        .bind(user_out)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into).ok_or_else(|| {
            LedgerError::NotFound(format!("switching key {user_in}->{user_out} not found"))
        })
    }

    async fn write_transaction(&self, tx: &TransactionRecord) -> Result<(), LedgerError> {
        write_transaction_tx(&self.pool, tx).await
    }

    async fn get_transaction(&self, uuid: Uuid) -> Result<TransactionRecord, LedgerError> {
        let row: Option<TransactionRow> = sqlx::query_as(
            r#"
            SELECT confirming_phase, uuid, sender, receipt, ct_sender, ct_receipt,
                   sig_ct_sender, ct_sender_signed_by, sig_ct_receipt, ct_receipt_signed_by,
                   timestamp, is_valid
            FROM transactions WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        let row = row.ok_or_else(|| LedgerError::NotFound(format!("transaction {uuid} not found")))?;
        row.try_into()
    }

    async fn commit_transfer(
        &self,
        sender_id: Uuid,
        sender_balance_ct: Vec<u8>,
        receipt_id: Uuid,
        receipt_balance_ct: Vec<u8>,
        tx: &TransactionRecord,
    ) -> Result<(), LedgerError> {
        let mut db_tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO balances (user_id, ct) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET ct = EXCLUDED.ct
            "#,
        )
        .bind(sender_id)
        .bind(&sender_balance_ct)
        .execute(&mut *db_tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO balances (user_id, ct) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET ct = EXCLUDED.ct
            "#,
        )
        .bind(receipt_id)
        .bind(&receipt_balance_ct)
        .execute(&mut *db_tx)
        .await?;

        write_transaction_in(&mut db_tx, tx).await?;

        db_tx.commit().await?;
        Ok(())
    }
}

async fn put_ckks_key_tx(
    conn: &mut sqlx::PgConnection,
    key: &CkksKeyEntry,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        INSERT INTO ckks_keys (id, user_id, public_key, created_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (id) DO UPDATE SET public_key = EXCLUDED.public_key
        "#,
    )
    .bind(key.id)
    .bind(key.user_id)
    .bind(&key.public_key)
    .execute(conn)
    .await?;
    Ok(())
}

async fn put_ecdsa_key_tx(
    conn: &mut sqlx::PgConnection,
    key: &EcdsaKeyEntry,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        INSERT INTO ecdsa_keys (id, user_id, public_key, created_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (id) DO UPDATE SET public_key = EXCLUDED.public_key
        "#,
    )
    .bind(key.id)
    .bind(key.user_id)
    .bind(&key.public_key)
    .execute(conn)
    .await?;
    Ok(())
}

async fn write_transaction_tx(pool: &PgPool, tx: &TransactionRecord) -> Result<(), LedgerError> {
    let mut conn = pool.acquire().await?;
    write_transaction_in(&mut conn, tx).await
}

async fn write_transaction_in(
    conn: &mut sqlx::PgConnection,
    tx: &TransactionRecord,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            uuid, confirming_phase, sender, receipt,
            ct_sender, ct_receipt, sig_ct_sender, ct_sender_signed_by,
            sig_ct_receipt, ct_receipt_signed_by, timestamp, is_valid
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (uuid) DO UPDATE SET
            confirming_phase = EXCLUDED.confirming_phase,
            ct_sender = EXCLUDED.ct_sender,
            ct_receipt = EXCLUDED.ct_receipt,
            sig_ct_sender = EXCLUDED.sig_ct_sender,
            ct_sender_signed_by = EXCLUDED.ct_sender_signed_by,
            sig_ct_receipt = EXCLUDED.sig_ct_receipt,
            ct_receipt_signed_by = EXCLUDED.ct_receipt_signed_by,
            timestamp = EXCLUDED.timestamp,
            is_valid = EXCLUDED.is_valid
        "#,
    )
    .bind(tx.uuid)
    .bind(tx.confirming_phase.to_string())
    .bind(tx.sender)
    .bind(tx.receipt)
    .bind(&tx.ct_sender)
    .bind(&tx.ct_receipt)
    .bind(&tx.sig_ct_sender)
    .bind(tx.ct_sender_signed_by)
    .bind(&tx.sig_ct_receipt)
    .bind(tx.ct_receipt_signed_by)
    .bind(tx.timestamp)
    .bind(tx.is_valid)
    .execute(conn)
    .await?;
    Ok(())
}
