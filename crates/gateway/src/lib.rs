//! HTTP gateway for Veritas.
//!
//! Serves the embedded single-page UI, a health check, and the v1 API:
//! session lifecycle plus chat endpoints that run one verification turn
//! per request (streamed over SSE or returned whole).
//!
//! Built on Axum.

pub mod api_v1;
pub mod frontend;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use veritas_agent::TurnOrchestrator;
use veritas_config::GatewayConfig;

/// Request bodies above this size are rejected with 413.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the full router: health, `/v1` API, and the embedded frontend.
///
/// Layers applied:
/// - CORS limited to the gateway's own origin plus configured extras
/// - Request body size limit (64 KiB)
/// - HTTP trace logging
pub fn build_router(api_state: api_v1::SharedApiState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(api_state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(config))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let own = [
        format!("http://{}:{}", config.host, config.port),
        format!("http://localhost:{}", config.port),
    ];

    let origins: Vec<HeaderValue> = own
        .iter()
        .chain(config.allowed_origins.iter())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// The orchestrator is built by the caller once secrets have been checked,
/// so a misconfigured process never reaches this point.
pub async fn start(
    config: GatewayConfig,
    orchestrator: TurnOrchestrator,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);

    let api_state = Arc::new(api_v1::ApiV1State::new(
        Arc::new(orchestrator),
        config.max_sessions,
    ));
    let app = build_router(api_state, &config);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
