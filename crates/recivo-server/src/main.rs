//! HTTP server entry point and Axum router setup.
//!
//! Initializes the shared analyzer, configures routes, and starts the
//! Axum server.

mod handlers;
mod services;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use recivo_vision::{OpenAiAnalyzer, ReceiptAnalysis};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

const DEFAULT_VISION_MODEL: &str = "gpt-4o";

/// Shared server state accessible from all handlers.
///
/// The analyzer is constructed once at startup and reused across requests
/// so the underlying API client can pool connections.
pub struct ServerState {
    pub analyzer: Arc<dyn ReceiptAnalysis>,
}

/// Builds the application router.
pub fn router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route("/api/ai/receipt/extract", post(handlers::receipt::extract))
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .compact()
        .init();

    let model = std::env::var("RECIVO_VISION_MODEL")
        .unwrap_or_else(|_| DEFAULT_VISION_MODEL.into());
    info!("Using vision model: {}", model);

    let state = Arc::new(ServerState {
        analyzer: Arc::new(OpenAiAnalyzer::new(&model)),
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = format!("0.0.0.0:{}", port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
