//! # assetd: upload files, serve them back
//!
//! `assetd` is a small HTTP service that stores uploaded files under fresh random names in a
//! single flat directory and serves them back with a content type derived from their extension.
//!
//! ## Request Flow
//!
//! A client posts a multipart form to `/api/files` with one or more files under the `files` field.
//! The [upload handler](api::handlers::files::upload_files) reads the whole form (bounded by
//! `assets.max_upload_size`), then hands the parts to the [`AssetStore`], which writes each one
//! to `<asset-dir>/<uuid>.<ext>` and reports its public path. The response is a JSON
//! [path report](api::models::files::PathReport):
//!
//! ```json
//! {"path": ["/assets/550e8400-e29b-41d4-a716-446655440000.png"]}
//! ```
//!
//! The client later fetches `/assets/<uuid>.<ext>`; the [asset handlers](api::handlers::assets)
//! stream the file back with a `Content-Type` from the [extension table](content_type), falling
//! back to content sniffing for extensions the table doesn't know.
//!
//! Uploads and reads share nothing but the asset directory. Every upload gets its own random
//! identifiers, so concurrent requests need no locking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use assetd::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = assetd::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     assetd::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

#[cfg(test)]
pub mod test_utils;

pub mod api;
pub mod config;
pub mod content_type;
pub mod errors;
mod openapi;
pub mod storage;
pub mod telemetry;
mod types;

use crate::openapi::ApiDoc;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{any, get, post},
};
use bon::Builder;
pub use config::Config;
pub use storage::{AssetStore, UploadPart};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::AssetId;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: AssetStore,
}

/// Build the application router.
///
/// | Route                      | Method | Handler                                 |
/// |----------------------------|--------|-----------------------------------------|
/// | `/api/files`               | POST   | multipart upload (405 for other methods) |
/// | `/assets`                  | GET    | asset directory, prefix stripped        |
/// | `/assets/`, `/assets/*`    | GET    | request path against the web root       |
/// | `/healthz`                 | GET    | liveness                                |
/// | `/api-docs/openapi.json`   | GET    | OpenAPI document                        |
/// | `/docs`                    | GET    | Scalar API reference                    |
/// | `/` and anything unrouted  | any    | 301 to the asset prefix                 |
///
/// `/assets/` stands for the configured `assets.public_prefix`.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> Router {
    use api::handlers::{assets, files};

    let prefix = state.config.assets.public_prefix.as_str();
    // Config validation guarantees a prefix like "/assets/", so this is never empty
    let prefix_dir = prefix.trim_end_matches('/');

    // Upload route with its own body limit. Wrong methods stop at the fallback and never reach the
    // multipart parser.
    let upload = post(files::upload_files)
        .fallback(files::reject_method)
        .layer(DefaultBodyLimit::max(state.config.assets.max_upload_size as usize));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/api/files", upload)
        .route(prefix_dir, get(assets::serve_asset_dir))
        .route(prefix, get(assets::serve_prefix_root))
        .route(&format!("{prefix}{{*path}}"), get(assets::serve_prefixed))
        .route("/", any(assets::redirect_to_assets))
        .fallback(assets::redirect_to_assets)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Main application struct that owns the router and configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] validates the asset directory (creating it if configured)
///    and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, in-flight requests finish and telemetry
///    is flushed
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance. Fails when the asset directory is unusable.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting asset service with configuration: {:#?}", config);

        let store = AssetStore::new(config.assets.dir.clone(), config.assets.public_prefix.clone())?;
        store.prepare(config.assets.create_dir).await?;
        info!(dir = %store.dir().display(), prefix = store.public_prefix(), "Asset directory ready");

        let state = AppState::builder().config(config.clone()).store(store).build();
        let router = build_router(&state);

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Asset service listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_config};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_healthz() {
        let root = tempfile::tempdir().unwrap();
        let server = create_test_app(root.path()).await;

        let response = server.get("/healthz").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let root = tempfile::tempdir().unwrap();
        let server = create_test_app(root.path()).await;

        let response = server.get("/api-docs/openapi.json").await;

        response.assert_status(StatusCode::OK);
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/api/files"]["post"].is_object());
    }

    #[test_log::test(tokio::test)]
    async fn test_new_creates_asset_directory() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());

        Application::new(config).await.expect("Failed to create application");

        assert!(root.path().join("assets").is_dir());
    }

    #[tokio::test]
    async fn test_new_fails_on_missing_directory_without_create() {
        let root = tempfile::tempdir().unwrap();
        let mut config = create_test_config(root.path());
        config.assets.create_dir = false;

        assert!(Application::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_new_fails_on_empty_directory_path() {
        let root = tempfile::tempdir().unwrap();
        let mut config = create_test_config(root.path());
        config.assets.dir = std::path::PathBuf::new();

        let err = Application::new(config).await.err().expect("empty asset dir must fail");
        assert!(err.to_string().contains("can't be empty"));
    }

    #[tokio::test]
    async fn test_custom_prefix_routes() {
        let root = tempfile::tempdir().unwrap();
        let mut config = create_test_config(root.path());
        config.assets.public_prefix = "/media/".to_string();
        config.assets.dir = root.path().join("media");
        let server = Application::new(config).await.unwrap().into_test_server();
        std::fs::write(root.path().join("media/a.png"), b"\x89PNG\x0D\x0A\x1A\x0A").unwrap();

        let response = server.get("/").await;
        response.assert_status(StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()["location"], "/media/");

        let response = server.get("/media/a.png").await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/png");
    }
}
