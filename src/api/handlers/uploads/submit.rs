use axum::{
    Json,
    extract::{Multipart, State, multipart::Field},
};
use tracing::warn;

use crate::AppState;
use crate::api::error::AppError;

use super::types::{RawChunkFields, SubmitChunkResponse};

#[utoipa::path(
    post,
    path = "/uploads/chunks",
    request_body(content = Object, description = "Chunk payload with its metadata fields", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Chunk durably stored", body = SubmitChunkResponse),
        (status = 400, description = "Malformed chunk submission"),
        (status = 413, description = "Chunk exceeds the configured size limit")
    ),
    tag = "uploads"
)]
pub async fn submit_chunk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitChunkResponse>, AppError> {
    let result = async {
        let mut raw = RawChunkFields::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::InvalidRequest(format!("Malformed multipart request: {}", e))
        })? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "chunk" => {
                    raw.chunk_file_name = field.file_name().map(|s| s.to_string());
                    raw.chunk_content_type = field.content_type().map(|s| s.to_string());
                    let data = field.bytes().await.map_err(|e| {
                        if e.to_string().contains("length limit exceeded") {
                            AppError::PayloadTooLarge(format!(
                                "Chunk exceeds the {} byte limit",
                                state.config.max_chunk_bytes
                            ))
                        } else {
                            AppError::InvalidRequest(format!(
                                "Failed to read chunk payload: {}",
                                e
                            ))
                        }
                    })?;
                    raw.payload = Some(data.to_vec());
                }
                "uploadId" => raw.upload_id = Some(read_text(field).await?),
                "sequence" => raw.sequence = Some(read_text(field).await?),
                "totalChunks" => raw.total_chunks = Some(read_text(field).await?),
                "fileName" => raw.file_name = Some(read_text(field).await?),
                "contentType" => raw.content_type = Some(read_text(field).await?),
                other => {
                    warn!("Ignoring unexpected multipart field: {}", other);
                }
            }
        }

        let (request, payload) = raw.into_request()?;
        let outcome = state.uploads.submit_chunk(request, payload).await?;

        let assembled_id = outcome.complete.then(|| outcome.upload_id.clone());
        Ok(Json(SubmitChunkResponse {
            upload_id: outcome.upload_id,
            accepted: true,
            received_count: outcome.received_count,
            total_chunks: outcome.total_chunks,
            complete: outcome.complete,
            assembled_id,
        }))
    }
    .await;

    if result.is_err() {
        // Drain whatever the client is still sending so it reads our
        // error response instead of hitting a broken pipe
        while let Ok(Some(field)) = multipart.next_field().await {
            warn!("Draining unread multipart field: {:?}", field.name());
        }
    }

    result
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Failed to read field: {}", e)))
}
