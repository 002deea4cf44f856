//! The easel REST API: axum router, handlers and request plumbing.

pub mod api;
pub mod config;
pub mod errors;
pub mod extract;
pub mod metrics_defs;
pub mod rate_limit;
pub mod share_cache;

#[cfg(test)]
pub(crate) mod testutils;

use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::share_cache::ShareNegativeCache;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use easel_auth::CsrfTokens;
use easel_store::{
    BlobStore, Database, DrawingRepository, FilesystemBlobStore, ProjectRepository, StoreError,
    ThumbnailStore, UserRepository,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(thiserror::Error, Debug)]
pub enum ApiRunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ValidationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("blob store error: {0}")]
    Blobs(#[from] easel_store::BlobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credential parameters and session state shared by the auth handlers and
/// the request extractor.
pub struct AuthState {
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub min_password_len: usize,
    pub pbkdf2_iterations: u32,
    pub csrf: CsrfTokens,
    /// Verified against when the email is unknown, so the response time does
    /// not reveal whether an account exists.
    pub dummy_hash: String,
}

#[derive(Clone)]
pub struct AppState {
    pub users: UserRepository,
    pub projects: ProjectRepository,
    pub drawings: DrawingRepository,
    pub thumbnails: ThumbnailStore,
    pub blobs: Arc<dyn BlobStore>,
    pub auth: Arc<AuthState>,
    pub limiter: Arc<RateLimiter>,
    pub share_cache: Arc<ShareNegativeCache>,
    pub max_payload_bytes: usize,
}

impl AppState {
    pub fn build(config: &Config, database: Database, blobs: Arc<dyn BlobStore>) -> Self {
        let token_ttl = Duration::from_secs(config.auth.token_ttl_secs);

        let auth = AuthState {
            jwt_secret: config.auth.jwt_secret.clone(),
            token_ttl_secs: config.auth.token_ttl_secs,
            min_password_len: config.auth.min_password_len,
            pbkdf2_iterations: config.auth.pbkdf2_iterations,
            csrf: CsrfTokens::new(token_ttl),
            dummy_hash: easel_auth::hash_password(
                "easel.dummy.password",
                config.auth.pbkdf2_iterations,
            ),
        };

        let limiter = RateLimiter::new(
            config.limits.rate_limit.max_requests,
            Duration::from_secs(config.limits.rate_limit.window_secs),
        );

        AppState {
            users: UserRepository::new(database.clone()),
            projects: ProjectRepository::new(database.clone()),
            drawings: DrawingRepository::new(database.clone()),
            thumbnails: ThumbnailStore::new(database, config.thumbnails.max_total_bytes),
            blobs,
            auth: Arc::new(auth),
            limiter: Arc::new(limiter),
            share_cache: Arc::new(ShareNegativeCache::new()),
            max_payload_bytes: config.limits.max_payload_bytes,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_body = state.max_payload_bytes;

    Router::new()
        .route("/health", get(api::health::health))
        .route("/api/v1/auth/signup", post(api::auth::signup))
        .route("/api/v1/auth/login", post(api::auth::login))
        .route("/api/v1/auth/logout", post(api::auth::logout))
        .route("/api/v1/auth/me", get(api::auth::me))
        .route(
            "/api/v1/projects",
            get(api::projects::list_projects).post(api::projects::create_project),
        )
        .route(
            "/api/v1/projects/{id}",
            get(api::projects::get_project)
                .put(api::projects::rename_project)
                .delete(api::projects::delete_project),
        )
        .route(
            "/api/v1/projects/{id}/drawings",
            get(api::drawings::list_drawings).post(api::drawings::create_drawing),
        )
        .route(
            "/api/v1/drawings/{id}",
            get(api::drawings::get_drawing)
                .put(api::drawings::update_drawing)
                .delete(api::drawings::delete_drawing),
        )
        .route(
            "/api/v1/drawings/{id}/share",
            post(api::share::create_share).delete(api::share::revoke_share),
        )
        .route(
            "/api/v1/drawings/{id}/thumbnail",
            get(api::thumbnails::get_thumbnail).put(api::thumbnails::put_thumbnail),
        )
        .route("/api/v1/shared/{share_id}", get(api::share::get_shared))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Blocking entrypoint used by the binary: builds the runtime and serves
/// until the process is stopped.
pub fn run(config: Config) -> Result<(), ApiRunError> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_async(config))
}

pub async fn run_async(config: Config) -> Result<(), ApiRunError> {
    config.validate()?;

    let database = Database::open(&config.database.path)?;
    let blobs: Arc<dyn BlobStore> = Arc::new(FilesystemBlobStore::new(config.blobs.path.clone())?);
    let state = AppState::build(&config, database, blobs);
    let app = build_router(state);

    let addr = format!("{}:{}", config.listener.host, config.listener.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("easel API listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
