use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

/// Authentication middleware
/// Extracts the bearer token and verifies it against the identity provider;
/// the resulting principal rides on the request extensions. Requests without
/// a correctly-prefixed credential are rejected before any handler logic.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Get Authorization header
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return Err(AppError::Unauthorized(
                "Access denied. No token provided.".to_string(),
            ));
        }
    };

    // Every request re-verifies; no local session state
    let principal = state.identity.verify(token).await?;

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Router};
    use bytes::Bytes;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::error::Result;
    use crate::identity::IdentityVerifier;
    use crate::metadata::{DeleteOutcome, MetadataStore, RecordQuery};
    use crate::models::{FileRecord, NewFileRecord, Principal};
    use crate::services::FileService;
    use crate::storage::ObjectStore;

    const GOOD_TOKEN: &str = "good-token";

    /// Accepts exactly one token; everything else is an invalid credential.
    struct FixedVerifier;

    #[async_trait]
    impl IdentityVerifier for FixedVerifier {
        async fn verify(&self, bearer_token: &str) -> Result<Principal> {
            if bearer_token == GOOD_TOKEN {
                Ok(Principal {
                    uid: "uid-1".to_string(),
                    email: "a@example.com".to_string(),
                    name: "A".to_string(),
                })
            } else {
                Err(AppError::Unauthorized("Invalid token.".to_string()))
            }
        }
    }

    struct UnusedMetadata;

    #[async_trait]
    impl MetadataStore for UnusedMetadata {
        async fn insert(&self, _record: &NewFileRecord) -> Result<FileRecord> {
            Err(AppError::Upstream("not wired".to_string()))
        }

        async fn get_by_id(&self, _id: &str) -> Result<Option<FileRecord>> {
            Ok(None)
        }

        async fn query(&self, _query: &RecordQuery) -> Result<Vec<FileRecord>> {
            Ok(Vec::new())
        }

        async fn delete_by_id(&self, _id: &str) -> Result<DeleteOutcome> {
            Ok(DeleteOutcome::Missing)
        }
    }

    struct UnusedObjects;

    #[async_trait]
    impl ObjectStore for UnusedObjects {
        async fn put(&self, _key: &str, _data: Bytes, _content_type: &str) -> Result<String> {
            Err(AppError::Upstream("not wired".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }

        fn signed_url(&self, _key: &str, _ttl: Duration) -> Result<String> {
            Err(AppError::Upstream("not wired".to_string()))
        }
    }

    /// One protected route behind the real middleware; `hits` counts how many
    /// requests actually reached the handler.
    fn protected_app(hits: Arc<AtomicUsize>) -> Router {
        let state = AppState {
            config: Arc::new(Config::default()),
            identity: Arc::new(FixedVerifier),
            files: Arc::new(FileService::new(
                Arc::new(UnusedMetadata),
                Arc::new(UnusedObjects),
                1024,
            )),
        };

        Router::new()
            .route(
                "/protected",
                get(move |Extension(principal): Extension<Principal>| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        principal.uid
                    }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .with_state(state)
    }

    async fn request(app: Router, auth: Option<&str>) -> axum::response::Response {
        let mut builder = HttpRequest::builder().uri("/protected");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected_before_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = protected_app(hits.clone());

        let response = request(app, None).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = protected_app(hits.clone());

        // Right token, wrong scheme: the prefix check must not be bypassed
        let response = request(app, Some(&format!("Basic {}", GOOD_TOKEN))).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_token_stops_before_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = protected_app(hits.clone());

        let response = request(app, Some("Bearer wrong-token")).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_bearer_reaches_handler_with_principal() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = protected_app(hits.clone());

        let response = request(app, Some(&format!("Bearer {}", GOOD_TOKEN))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"uid-1");
    }
}
