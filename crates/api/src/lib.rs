pub mod ca;
pub mod client;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod fee;
pub mod handlers;
pub mod locks;
pub mod models;
pub mod routes;
pub mod store;
pub mod verify;

use std::sync::Arc;

use ca::CertificateAuthority;
use crypto::ckks::Params;
use engine::TransferEngine;
use store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub engine: TransferEngine,
    pub ca: Arc<dyn CertificateAuthority>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, ca: Arc<dyn CertificateAuthority>) -> Self {
        let params = Params::preset();
        let engine = TransferEngine::new(store.clone(), params);
        AppState { store, engine, ca }
    }
}
