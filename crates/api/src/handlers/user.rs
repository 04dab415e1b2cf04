use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::{ApiResponse, LedgerResult};

#[derive(Debug, Deserialize)]
pub struct UuidRequest {
    pub uuid: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BalanceBody {
    pub balance: String,
}

pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UuidRequest>,
) -> LedgerResult<ApiResponse<BalanceBody>> {
    let ct = state.store.get_balance(req.uuid).await?;
    Ok(ApiResponse::new(BalanceBody {
        balance: BASE64.encode(ct),
    }))
}
