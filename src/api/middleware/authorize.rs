use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::api::error::AppError;

/// Hook for putting an authentication scheme in front of the upload
/// endpoints without teaching the handlers about it. Deployments that
/// need one implement this over their token format and swap it into
/// the app state.
#[async_trait]
pub trait UploadAuthorizer: Send + Sync {
    async fn authorize(&self, headers: &HeaderMap) -> Result<(), AppError>;
}

/// Default authorizer for deployments running behind a trusted edge.
pub struct AllowAll;

#[async_trait]
impl UploadAuthorizer for AllowAll {
    async fn authorize(&self, _headers: &HeaderMap) -> Result<(), AppError> {
        Ok(())
    }
}

pub async fn authorize_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    state.authorizer.authorize(request.headers()).await?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DenyAll;

    #[async_trait]
    impl UploadAuthorizer for DenyAll {
        async fn authorize(&self, _headers: &HeaderMap) -> Result<(), AppError> {
            Err(AppError::Forbidden("not today".to_string()))
        }
    }

    #[tokio::test]
    async fn test_allow_all_permits_everything() {
        let headers = HeaderMap::new();
        assert!(AllowAll.authorize(&headers).await.is_ok());
    }

    #[tokio::test]
    async fn test_deny_all_rejects() {
        let headers = HeaderMap::new();
        let err = DenyAll.authorize(&headers).await.unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }
}
