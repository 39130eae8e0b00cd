use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header},
    response::IntoResponse,
};

use crate::AppState;
use crate::api::error::AppError;

#[utoipa::path(
    get,
    path = "/uploads/{id}/blob",
    params(
        ("id" = String, Path, description = "Upload session id")
    ),
    responses(
        (status = 200, description = "Assembled blob, chunks streamed in sequence order"),
        (status = 400, description = "Upload is not complete yet"),
        (status = 404, description = "Unknown upload id")
    ),
    tag = "uploads"
)]
pub async fn download_blob(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (session, stream) = state.uploads.assembled(&id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&session.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    // Strip anything that could break the header out of the filename
    let safe_name: String = session
        .file_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect();
    let file_name = if safe_name.trim().is_empty() {
        session.id.clone()
    } else {
        safe_name
    };

    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok((headers, Body::from_stream(stream)))
}
