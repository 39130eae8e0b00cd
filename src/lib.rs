pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::middleware::authorize::{UploadAuthorizer, authorize_middleware};
use crate::config::UploadConfig;
use crate::services::storage::ChunkStorage;
use crate::services::tracker::FragmentTracker;
use crate::services::upload_service::UploadService;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::uploads::submit::submit_chunk,
        api::handlers::uploads::status::upload_status,
        api::handlers::uploads::cancel::cancel_upload,
        api::handlers::uploads::blob::download_blob,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::uploads::types::SubmitChunkResponse,
            api::handlers::uploads::types::UploadStatusResponse,
            api::handlers::uploads::types::CancelUploadResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "uploads", description = "Resumable chunked upload endpoints"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn ChunkStorage>,
    pub tracker: Arc<dyn FragmentTracker>,
    pub uploads: Arc<UploadService>,
    pub authorizer: Arc<dyn UploadAuthorizer>,
    pub config: UploadConfig,
}

pub fn create_app(state: AppState) -> Router {
    // Multipart framing adds a little on top of the chunk payload itself
    let body_limit = state.config.max_chunk_bytes + 1024 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/uploads/chunks",
            post(api::handlers::uploads::submit::submit_chunk)
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(from_fn_with_state(state.clone(), authorize_middleware)),
        )
        .route(
            "/uploads/:id",
            get(api::handlers::uploads::status::upload_status)
                .delete(api::handlers::uploads::cancel::cancel_upload)
                .layer(from_fn_with_state(state.clone(), authorize_middleware)),
        )
        .route(
            "/uploads/:id/blob",
            get(api::handlers::uploads::blob::download_blob)
                .layer(from_fn_with_state(state.clone(), authorize_middleware)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
