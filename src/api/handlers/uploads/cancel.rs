use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

use crate::AppState;
use crate::api::error::AppError;

use super::types::CancelUploadResponse;

#[utoipa::path(
    delete,
    path = "/uploads/{id}",
    params(
        ("id" = String, Path, description = "Upload session id")
    ),
    responses(
        (status = 200, description = "Upload discarded", body = CancelUploadResponse),
        (status = 404, description = "Unknown upload id")
    ),
    tag = "uploads"
)]
pub async fn cancel_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelUploadResponse>, AppError> {
    state.uploads.cancel(&id).await?;

    info!("🗑️  Upload {} cancelled by caller", id);

    Ok(Json(CancelUploadResponse {
        upload_id: id,
        cancelled: true,
    }))
}
