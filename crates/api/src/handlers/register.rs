use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::crypto::{ckks, ecdsa};
use crate::error::{ApiResponse, LedgerError, LedgerResult};
use crate::models::{CkksKeyEntry, EcdsaKeyEntry, User};

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub uuid: Uuid,
    pub name: String,
    pub ckks_pubkey: String,
    pub ecdsa_pubkey: String,
}

#[derive(Debug, Serialize)]
pub struct OkBody {}

#[tracing::instrument(skip(state, req), fields(user = %req.uuid))]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUserRequest>,
) -> LedgerResult<ApiResponse<OkBody>> {
    let ckks_bytes = BASE64.decode(&req.ckks_pubkey)?;
    let ecdsa_bytes = BASE64.decode(&req.ecdsa_pubkey)?;

    let ckks_pk = ckks::decode_public_key(&ckks_bytes)?;
    ecdsa::decode_public_key(&ecdsa_bytes).map_err(|e| LedgerError::BadRequest(e.to_string()))?;

    let now = Utc::now();
    let user = User {
        id: req.uuid,
        name: req.name,
        ckks_keys: vec![CkksKeyEntry {
            id: Uuid::new_v4(),
            user_id: req.uuid,
            public_key: ckks_bytes,
        }],
        ecdsa_keys: vec![EcdsaKeyEntry {
            id: Uuid::new_v4(),
            user_id: req.uuid,
            public_key: ecdsa_bytes,
        }],
        created_at: now,
        updated_at: now,
    };

    let mut rng = OsRng;
    let zero_balance = ckks::encrypt(state.engine.params(), &ckks_pk, 0.0, &mut rng);
    let balance_bytes = ckks::encode_ct(&zero_balance)?;

    state.store.put_user(&user, balance_bytes).await?;

    Ok(ApiResponse::new(OkBody {}))
}

#[derive(Debug, Deserialize)]
pub struct RegisterSwkRequest {
    #[serde(rename = "userIn")]
    pub user_in: Uuid,
    #[serde(rename = "userOut")]
    pub user_out: Uuid,
    pub swk: String,
}

#[tracing::instrument(skip(state, req), fields(user_in = %req.user_in, user_out = %req.user_out))]
pub async fn register_swk(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterSwkRequest>,
) -> LedgerResult<ApiResponse<OkBody>> {
    let key_material = BASE64.decode(&req.swk)?;
    ckks::decode_switching_key(&key_material)?;

    let entry = crate::models::SwitchingKeyEntry {
        id: Uuid::new_v4(),
        user_in: req.user_in,
        user_out: req.user_out,
        pk_in: None,
        pk_out: None,
        key_material,
    };
    state.store.put_switching_key(&entry).await?;

    Ok(ApiResponse::new(OkBody {}))
}
