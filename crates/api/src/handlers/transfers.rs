use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::{ApiResponse, LedgerResult};
use crate::models::{TransactionJson, TransactionRecord};

#[derive(Debug, Serialize)]
pub struct TransactionBody {
    pub transaction: TransactionJson,
}

fn respond(record: TransactionRecord) -> ApiResponse<TransactionBody> {
    ApiResponse::new(TransactionBody {
        transaction: TransactionJson::from(&record),
    })
}

pub async fn create_by_sender_pk(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransactionJson>,
) -> LedgerResult<ApiResponse<TransactionBody>> {
    let incoming: TransactionRecord = req.try_into()?;
    let record = state.engine.create_by_sender_pk(incoming).await?;
    Ok(respond(record))
}

pub async fn create_by_receipt_pk(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransactionJson>,
) -> LedgerResult<ApiResponse<TransactionBody>> {
    let incoming: TransactionRecord = req.try_into()?;
    let record = state.engine.create_by_receipt_pk(incoming).await?;
    Ok(respond(record))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub uuid: Uuid,
    #[serde(rename = "sigCtSender")]
    pub sig_ct_sender: String,
}

pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmRequest>,
) -> LedgerResult<ApiResponse<TransactionBody>> {
    let sig = BASE64.decode(&req.sig_ct_sender)?;
    let record = state.engine.confirm(req.uuid, sig).await?;
    Ok(respond(record))
}

#[derive(Debug, Deserialize)]
pub struct UuidRequest {
    pub uuid: Uuid,
}

pub async fn reject(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UuidRequest>,
) -> LedgerResult<ApiResponse<TransactionBody>> {
    let record = state.engine.reject(req.uuid).await?;
    Ok(respond(record))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UuidRequest>,
) -> LedgerResult<ApiResponse<TransactionBody>> {
    let record = state.store.get_transaction(req.uuid).await?;
    Ok(respond(record))
}
