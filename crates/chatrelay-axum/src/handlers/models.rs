//! Model catalog handler.

use axum::Json;
use tracing::debug;

use crate::dto::ModelInfoDto;

/// `GET /api/v1/models`
pub async fn list() -> Json<Vec<ModelInfoDto>> {
    debug!("GET /api/v1/models");
    Json(ModelInfoDto::catalog())
}
