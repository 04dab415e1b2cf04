//! Thin `reqwest` wrappers over every endpoint in the wire protocol,
//! mirroring the original's `internal/clientlib/server.go`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::TransactionJson;

pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionResponse {
    #[allow(dead_code)]
    status: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct RegisterUserRequest {
    uuid: Uuid,
    name: String,
    ckks_pubkey: String,
    ecdsa_pubkey: String,
}

#[derive(Debug, Serialize)]
struct RegisterSwkRequest {
    #[serde(rename = "userIn")]
    user_in: Uuid,
    #[serde(rename = "userOut")]
    user_out: Uuid,
    swk: String,
}

#[derive(Debug, Serialize)]
struct ConfirmRequest {
    uuid: Uuid,
    #[serde(rename = "sigCtSender")]
    sig_ct_sender: String,
}

#[derive(Debug, Serialize)]
struct UuidRequest {
    uuid: Uuid,
}

#[derive(Debug, Deserialize)]
struct OkResponse {
    #[allow(dead_code)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    #[allow(dead_code)]
    status: String,
    transaction: TransactionJson,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[allow(dead_code)]
    status: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct FailureResponse {
    #[allow(dead_code)]
    status: String,
    err: String,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn version(&self) -> Result<String, LedgerError> {
        let resp = self
            .http
            .get(format!("{}/version", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        let body: VersionResponse = parse(resp).await?;
        Ok(body.version)
    }

    pub async fn register_user(
        &self,
        uuid: Uuid,
        name: &str,
        ckks_pubkey: &[u8],
        ecdsa_pubkey: &[u8],
    ) -> Result<(), LedgerError> {
        let req = RegisterUserRequest {
            uuid,
            name: name.to_string(),
            ckks_pubkey: BASE64.encode(ckks_pubkey),
            ecdsa_pubkey: BASE64.encode(ecdsa_pubkey),
        };
        let resp = self
            .http
            .post(format!("{}/register/user", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(transport_error)?;
        let _: OkResponse = parse(resp).await?;
        Ok(())
    }

    pub async fn register_swk(&self, user_in: Uuid, user_out: Uuid, swk: &[u8]) -> Result<(), LedgerError> {
        let req = RegisterSwkRequest {
            user_in,
            user_out,
            swk: BASE64.encode(swk),
        };
        let resp = self
            .http
            .post(format!("{}/register/swk", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(transport_error)?;
        let _: OkResponse = parse(resp).await?;
        Ok(())
    }

    pub async fn create_by_sender_pk(&self, tx: &TransactionJson) -> Result<TransactionJson, LedgerError> {
        self.post_transaction("/transaction/create/bySenderPK", tx).await
    }

    pub async fn create_by_receipt_pk(&self, tx: &TransactionJson) -> Result<TransactionJson, LedgerError> {
        self.post_transaction("/transaction/create/byReceiptPK", tx).await
    }

    pub async fn confirm(&self, uuid: Uuid, sig_ct_sender: &[u8]) -> Result<TransactionJson, LedgerError> {
        let req = ConfirmRequest {
            uuid,
            sig_ct_sender: BASE64.encode(sig_ct_sender),
        };
        let resp = self
            .http
            .post(format!("{}/transaction/confirm", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(transport_error)?;
        let body: TransactionResponse = parse(resp).await?;
        Ok(body.transaction)
    }

    pub async fn get_transaction(&self, uuid: Uuid) -> Result<TransactionJson, LedgerError> {
        let resp = self
            .http
            .post(format!("{}/transaction/get", self.base_url))
            .json(&UuidRequest { uuid })
            .send()
            .await
            .map_err(transport_error)?;
        let body: TransactionResponse = parse(resp).await?;
        Ok(body.transaction)
    }

    pub async fn get_balance(&self, uuid: Uuid) -> Result<Vec<u8>, LedgerError> {
        let resp = self
            .http
            .post(format!("{}/user/getBalance", self.base_url))
            .json(&UuidRequest { uuid })
            .send()
            .await
            .map_err(transport_error)?;
        let body: BalanceResponse = parse(resp).await?;
        BASE64.decode(body.balance).map_err(LedgerError::from)
    }

    async fn post_transaction(&self, path: &str, tx: &TransactionJson) -> Result<TransactionJson, LedgerError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(tx)
            .send()
            .await
            .map_err(transport_error)?;
        let body: TransactionResponse = parse(resp).await?;
        Ok(body.transaction)
    }
}

fn transport_error(err: reqwest::Error) -> LedgerError {
    LedgerError::Protocol(format!("request to ledger server failed: {err}"))
}

async fn parse<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, LedgerError> {
    if resp.status().is_success() {
        resp.json::<T>().await.map_err(transport_error)
    } else {
        let failure: FailureResponse = resp.json().await.map_err(transport_error)?;
        Err(LedgerError::Protocol(failure.err))
    }
}
