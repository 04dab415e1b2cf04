use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;
use crate::handlers;

pub fn create_router(state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route("/api/health", get(handlers::health::handler))
        .route("/version", get(handlers::version::handler))
        .route("/register/user", post(handlers::register::register_user))
        .route("/register/swk", post(handlers::register::register_swk))
        .route(
            "/transaction/create/bySenderPK",
            post(handlers::transfers::create_by_sender_pk),
        )
        .route(
            "/transaction/create/byReceiptPK",
            post(handlers::transfers::create_by_receipt_pk),
        )
        .route("/transaction/confirm", post(handlers::transfers::confirm))
        .route("/transaction/reject", post(handlers::transfers::reject))
        .route("/transaction/get", post(handlers::transfers::get))
        .route("/user/getBalance", post(handlers::user::get_balance))
        .with_state(state)
}
