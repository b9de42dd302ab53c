//! HTTP API gateway for KnoRoute.
//!
//! Exposes the retrieval workflow over REST:
//!
//! - `GET  /health`: liveness and version
//! - `POST /v1/query`: answer a question
//! - `POST /v1/insights`: write a learned insight to memory
//! - `GET  /v1/stats`: document counts per store
//! - `GET  /v1/events`: SSE stream of pipeline events
//!
//! Built on Axum.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use knoroute_agent::{KnowledgeRouter, WorkflowSettings};
use knoroute_config::AppConfig;
use knoroute_core::event::EventBus;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub router: Arc<KnowledgeRouter>,
    pub event_bus: Arc<EventBus>,
}

impl GatewayState {
    pub fn new(router: Arc<KnowledgeRouter>, event_bus: Arc<EventBus>) -> Self {
        Self { router, event_bus }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Request body size limit (1 MB)
/// - CORS for local front ends
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(|origin, _| {
            origin
                .to_str()
                .is_ok_and(|o| o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1"))
        }))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Assemble the workflow from configuration.
pub fn build_state(config: &AppConfig) -> Result<SharedState, knoroute_core::Error> {
    let knowledge = knoroute_stores::build_knowledge_base(&config.stores)?;
    let reasoner = knoroute_providers::build_reasoner(config)?;
    let event_bus = Arc::new(EventBus::default());
    let router = KnowledgeRouter::new(knowledge, reasoner, WorkflowSettings::from(config))
        .with_event_bus(event_bus.clone());
    Ok(Arc::new(GatewayState::new(Arc::new(router), event_bus)))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(&config)?;

    info!(
        addr = %addr,
        reasoner = %state.router.reasoner_name(),
        backend = %config.stores.backend,
        "Gateway starting"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
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

    fn test_state() -> SharedState {
        let mut config = AppConfig::default();
        config.stores.backend = "memory".into();
        config.reasoning.provider = "heuristic".into();
        build_state(&config).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = build_router(test_state());
        let req = Request::builder().uri("/v2/query").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
