mod config;
mod credentials;
mod error;
mod handlers;
mod identity;
mod metadata;
mod middleware;
mod models;
mod services;
mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::credentials::ServiceAccount;
use crate::identity::{FirebaseVerifier, IdentityVerifier};
use crate::metadata::FirestoreStore;
use crate::services::FileService;
use crate::storage::signer::UrlSigner;
use crate::storage::GcsStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub files: Arc<FileService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudkeep=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cloudkeep...");

    // Load configuration
    let config = Config::load()?;
    let config = Arc::new(config);
    tracing::info!("Configuration loaded for project {}", config.google.project_id);

    // One client for all upstream calls, with an explicit timeout
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()?;

    let account = ServiceAccount::from_config(&config.google)?;

    let identity: Arc<dyn IdentityVerifier> = Arc::new(FirebaseVerifier::new(
        &config.google.project_id,
        &config.google.identity_certs_url,
        client.clone(),
    ));

    let metadata = Arc::new(FirestoreStore::new(
        &config.google.firestore_endpoint,
        &config.google.project_id,
        account.clone(),
        client.clone(),
    ));

    let signer = if config.google.hmac_access_id.is_empty() {
        tracing::warn!("No HMAC key configured; download URLs will be unavailable");
        None
    } else {
        Some(UrlSigner::new(
            &config.google.hmac_access_id,
            &config.google.hmac_secret,
            "storage.googleapis.com",
        ))
    };

    let objects = Arc::new(GcsStore::new(
        &config.google.storage_endpoint,
        &config.google.storage_bucket,
        account,
        signer,
        client,
    ));

    let files = Arc::new(FileService::new(
        metadata,
        objects,
        config.upload.max_file_size,
    ));

    let state = AppState {
        config: config.clone(),
        identity,
        files,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Multipart framing needs some slack above the file size limit
    let body_limit = state.config.upload.max_file_size as usize + 1024 * 1024;

    // Every endpoint requires a verified bearer credential
    let routes = Router::new()
        .route("/auth/verify", get(handlers::auth::verify))
        .route("/auth/profile", get(handlers::auth::profile))
        .route("/files", get(handlers::file::list_files))
        .route("/files/upload", post(handlers::file::upload_file))
        .route(
            "/files/:id",
            get(handlers::file::get_file).delete(handlers::file::delete_file),
        )
        .route("/files/:id/download", get(handlers::file::download_file))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
