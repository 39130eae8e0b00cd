use axum::{
    Json,
    extract::{Path, State},
};

use crate::AppState;
use crate::api::error::AppError;

use super::types::UploadStatusResponse;

#[utoipa::path(
    get,
    path = "/uploads/{id}",
    params(
        ("id" = String, Path, description = "Upload session id")
    ),
    responses(
        (status = 200, description = "Upload progress", body = UploadStatusResponse),
        (status = 404, description = "Unknown upload id")
    ),
    tag = "uploads"
)]
pub async fn upload_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UploadStatusResponse>, AppError> {
    let (session, sequences) = state.uploads.status(&id).await?;

    Ok(Json(UploadStatusResponse {
        upload_id: session.id,
        file_name: session.file_name,
        content_type: session.content_type,
        total_chunks: session.total_chunks as u32,
        received_count: sequences.len() as u32,
        received_sequences: sequences,
        complete: session.status == "complete",
        created_at: session.created_at,
        last_activity_at: session.last_activity_at,
    }))
}
