//! # simtaq-api
//!
//! REST API layer for SIMTAQ: authentication, the four role areas (admin,
//! guru, siswa, orang tua), shared endpoints, push fan-out, certificate PDFs and
//! report exports.

pub mod activity;
pub mod auth;
pub mod cache;
pub mod certificate;
pub mod middleware;
pub mod push;
pub mod report;
pub mod routes;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use simtaq_db::{storage::StorageClient, Database};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::push::PushDispatcher;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Local-disk storage backing `/uploads`.
    pub storage: StorageClient,
    /// Dashboard aggregates, keyed by [`cache::ADMIN_STATS`] / [`cache::GURU_STATS`].
    pub cache: TtlCache<serde_json::Value>,
    pub push: PushDispatcher,
    /// Outbound client for the audio proxy.
    pub http: reqwest::Client,
}

impl AppState {
    /// Assemble state from config. Push is disabled when VAPID keys are absent.
    pub fn new(db: Database, config: &simtaq_common::config::AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.audio.timeout_secs))
            .user_agent(concat!("simtaq/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let transport = push::VapidTransport::from_config(&config.push, http.clone())?
            .map(|t| Arc::new(t) as Arc<dyn push::PushTransport>);

        Ok(Self {
            storage: StorageClient::new(&config.storage),
            cache: TtlCache::new(Duration::from_secs(config.cache.ttl_secs)),
            push: PushDispatcher::new(db.pg.clone(), transport),
            http,
            db,
        })
    }
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let config = simtaq_common::config::get();

    let api_routes = Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::audio::router())
        .merge(routes::shared::router())
        .merge(routes::admin::router())
        .merge(routes::guru::router())
        .merge(routes::siswa::router())
        .merge(routes::orangtua::router());

    // multipart uploads carry an image plus form fields
    let body_limit = config.storage.max_upload_bytes + 1024 * 1024;

    Router::new()
        .nest("/api", api_routes)
        .nest_service(
            &config.storage.public_prefix,
            tower_http::services::ServeDir::new(state.storage.root()),
        )
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(DefaultBodyLimit::disable())
        .layer(tower_http::limit::RequestBodyLimitLayer::new(body_limit))
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(Arc::new(state))
}
