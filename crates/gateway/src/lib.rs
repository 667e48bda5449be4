//! HTTP chat shell for TAZMIC.
//!
//! Serves the embedded chat page at `/`, a health check at `/health` and
//! the JSON API under `/v1`. Built on Axum.

pub mod api_v1;
pub mod frontend;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use tazmic_config::GatewayConfig;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub use api_v1::{ApiV1State, SharedApiState};

/// Build the full router: chat page, health check and v1 API.
pub fn build_router(state: SharedApiState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(config))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Allow the page's own origin only.
fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let origin = format!("http://{}:{}", config.host, config.port);
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    match HeaderValue::from_str(&origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            warn!(origin = %origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn start(state: SharedApiState, config: &GatewayConfig) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(Arc::clone(&state), config);

    info!(addr = %addr, collection = %state.collection, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn app() -> Router {
        build_router(api_v1::tests::test_state(false).await, &GatewayConfig::default())
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn api_is_nested_under_v1() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message": "what color is the sky"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chat_page_is_served_at_root() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let huge = format!(r#"{{"message": "{}"}}"#, "a".repeat(2 * 1024 * 1024));
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(huge))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
