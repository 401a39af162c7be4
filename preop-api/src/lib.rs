//! preop-api library - inspection submission and consolidation service
//!
//! One axum service: a token-gated submission pipeline that accumulates
//! preoperational inspections per driver and rolls every 15 of them up
//! into a consolidated PDF report, retiring the source records.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use preop_common::config::{ServiceConfig, StorageConfig};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod api;
pub mod auth;
pub mod consolidate;
pub mod ingest;
pub mod render;
pub mod signature;
pub mod storage;

use consolidate::{ConsolidationEngine, UserLocks};
use render::{DocumentRenderer, PdfRenderer};
use signature::SignatureResolver;
use storage::ArtifactStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub store: ArtifactStore,
    pub engine: Arc<ConsolidationEngine>,
    pub locks: Arc<UserLocks>,
    pub config: ServiceConfig,
}

impl AppState {
    /// Wire the pipeline from its configuration. The renderer is a seam;
    /// production uses the built-in PDF renderer.
    pub fn new(db: SqlitePool, storage: StorageConfig, config: ServiceConfig) -> Self {
        Self::with_renderer(db, storage, config, Arc::new(PdfRenderer::new()))
    }

    pub fn with_renderer(
        db: SqlitePool,
        storage: StorageConfig,
        config: ServiceConfig,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        let store = ArtifactStore::new(storage.clone());
        let resolver = SignatureResolver::new(storage);
        let engine = ConsolidationEngine::new(
            db.clone(),
            store.clone(),
            resolver,
            renderer,
            config.consolidation_threshold,
        );

        Self {
            db,
            store,
            engine: Arc::new(engine),
            locks: Arc::new(UserLocks::new()),
            config,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/health", get(api::health))
        .route("/auth/register", post(api::register))
        .route("/auth/login", post(api::login))
        // Protected (bearer token via the CurrentUser extractor)
        .route("/auth/logout", post(api::logout))
        .route("/inspecciones/submit", post(api::submit))
        .route("/inspecciones/reporte15/:identifier", get(api::reporte15))
        .with_state(state)
        // Signature data URIs can push a submission past the default 2MB
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(CorsLayer::permissive())
}
