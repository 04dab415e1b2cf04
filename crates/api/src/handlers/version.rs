use serde::Serialize;

use crate::error::ApiResponse;

#[derive(Serialize)]
pub struct VersionBody {
    version: &'static str,
}

pub async fn handler() -> ApiResponse<VersionBody> {
    ApiResponse::new(VersionBody {
        version: env!("CARGO_PKG_VERSION"),
    })
}
