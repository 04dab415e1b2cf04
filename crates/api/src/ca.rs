//! Certificate Authority contract. The real protocol defers switching-key
//! issuance and auditing to an out-of-band CA; this crate only needs the
//! shape of that boundary, not a working implementation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LedgerError;

pub struct SwitchingKeyMaterial {
    pub user_in: Uuid,
    pub user_out: Uuid,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    async fn request_switching_key(
        &self,
        user_in: Uuid,
        user_out: Uuid,
    ) -> Result<SwitchingKeyMaterial, LedgerError>;
}

/// Always returns `NotImplemented`, matching the original's own stub.
pub struct StubCertificateAuthority;

#[async_trait]
impl CertificateAuthority for StubCertificateAuthority {
    async fn request_switching_key(
        &self,
        _user_in: Uuid,
        _user_out: Uuid,
    ) -> Result<SwitchingKeyMaterial, LedgerError> {
        Err(LedgerError::NotImplemented(
            "switching key issuance via CA is not implemented".to_string(),
        ))
    }
}
