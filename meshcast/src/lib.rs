//! # meshcast: image-to-3D conversion relay
//!
//! `meshcast` is a small relay service that turns 2D images into 3D meshes by
//! driving fal.ai's hosted TripoSR model. A browser client POSTs an image
//! reference (usually a data URL) plus conversion settings; the relay submits
//! the job to the external reconstruction queue, polls until it completes,
//! downloads the produced mesh file, and streams the raw bytes back with
//! download-friendly headers.
//!
//! ## Overview
//!
//! The hard work — image-to-3D reconstruction — happens entirely inside the
//! external managed service. This crate owns the contract around it: request
//! validation, credential handling, driving the queue protocol, explicit
//! validation of the service's response shape, and error mapping that never
//! leaks internal details to callers.
//!
//! ### Request Flow
//!
//! ```text
//! client ── POST /api/v1/convert {imageUrl, settings}
//!    relay ── POST {queue}/fal-ai/triposr      submit job
//!    relay ── GET  status_url  (repeat)        poll until COMPLETED
//!    relay ── GET  response_url                fetch result (mesh URL + labels)
//!    relay ── GET  model_mesh.url              download mesh bytes
//! client ◄─ 200, raw bytes, Content-Type + Content-Disposition
//! ```
//!
//! Every request is independent: no caching, no persistence, no retries. A
//! failed conversion returns a generic error and the caller resubmits.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) exposes the single conversion endpoint plus a
//! health check, documented with OpenAPI at `/docs`.
//!
//! The **reconstruction client** ([`reconstruction`]) is the seam to the
//! external service: a [`reconstruction::Reconstruct`] trait with a reqwest
//! implementation of fal.ai's queue API.
//!
//! The **configuration** ([`config`]) is loaded from YAML plus environment
//! variables; the fal.ai credential is an ordinary config field injected at
//! construction time, so the missing-credential path is testable without
//! touching process-wide state.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use meshcast::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = meshcast::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     meshcast::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod errors;
mod openapi;
pub mod reconstruction;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use crate::config::CorsOrigin;
use crate::reconstruction::{FalClient, Reconstruct};
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Router, http,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// Requests share nothing with each other; this struct only carries the loaded
/// configuration and the reconstruction client.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub reconstruction: Arc<dyn Reconstruct>,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut exposed_headers = Vec::new();
    for name in &config.cors.exposed_headers {
        exposed_headers.push(name.parse::<http::HeaderName>()?);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(vec![http::Method::GET, http::Method::POST])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(exposed_headers);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// This constructs the complete Axum router with:
/// - The conversion endpoint at `/api/v1/convert`
/// - Health check at `/healthz`
/// - OpenAPI documentation at `/docs`
/// - CORS configuration for the browser client
/// - Request body limit sized for inline data-URL images
/// - Tracing middleware
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/convert", post(api::handlers::convert::convert_image))
        // Data-URL images ride in the JSON body, so the body limit caps image size
        .layer(DefaultBodyLimit::max(state.config.limits.max_request_size as usize))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", openapi::ApiDoc::openapi()));

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns the router and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] builds the reconstruction client and router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests drain
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance from loaded configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting meshcast with configuration: {:#?}", config);

        if config.fal.api_key.is_none() {
            tracing::warn!("No fal.ai credential configured; conversion requests will be rejected");
        }

        let reconstruction: Arc<dyn Reconstruct> = Arc::new(FalClient::new(&config.fal));

        let state = AppState::builder().config(config.clone()).reconstruction(reconstruction).build();

        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "meshcast listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server shut down");
        Ok(())
    }
}
