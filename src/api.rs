//! REST API Server for the asset agent
//!
//! Exposes the completion service via HTTP endpoints for the frontend

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::OrchestrationError;
use crate::models::CompletionRequest;
use crate::service::CompletionService;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<CompletionService>,
}

fn status_for(error: &OrchestrationError) -> StatusCode {
    match error {
        OrchestrationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        OrchestrationError::ReasoningTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        OrchestrationError::LlmError(_) | OrchestrationError::HttpError(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Completion Endpoint
/// =============================

async fn completion(
    State(state): State<ApiState>,
    Json(req): Json<CompletionRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(prompt = %req.prompt, "Received completion request");

    match state.service.get_completion(req).await {
        Ok(blocks) => (StatusCode::OK, Json(ApiResponse::success(blocks))),
        Err(e) => {
            error!(error = %e, "Completion failed");
            (
                status_for(&e),
                Json(ApiResponse::error(format!("Completion failed: {}", e))),
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(service: Arc<CompletionService>) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/completion", post(completion))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    service: Arc<CompletionService>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Orchestrator, DEFAULT_DIRECTIVE};
    use crate::encoder::DirectGoalEncoder;
    use crate::library::create_default_library;
    use crate::llm::{MockReasoningService, Reasoner};
    use crate::oracles::StaticMarketData;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    fn router(mock: MockReasoningService, timeout: Duration) -> Router {
        let reasoner = Reasoner::new(Arc::new(mock)).with_timeout(timeout);
        let library =
            create_default_library(reasoner, Arc::new(StaticMarketData::default())).unwrap();
        let orchestrator = Orchestrator::new(Arc::new(library), DEFAULT_DIRECTIVE);
        let service = CompletionService::new(Arc::new(orchestrator), Arc::new(DirectGoalEncoder));
        create_router(Arc::new(service))
    }

    async fn post_completion(router: Router, prompt: &str) -> (StatusCode, ApiResponse) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/completion")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "prompt": prompt }).to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(MockReasoningService::new(), Duration::from_secs(1));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_completion_returns_blocks() {
        let app = router(
            MockReasoningService::new()
                .respond("getOracles", json!({ "oracles": [] }))
                .respond("chooseUIBlocks", json!({ "blocks": ["SUMMARY"] }))
                .respond("getUIBlockProps", json!({ "content": "The NSE is open." })),
            Duration::from_secs(1),
        );

        let (status, body) = post_completion(app, "is the NSE open?").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        let data = body.data.unwrap();
        assert_eq!(data[0]["name"], "SUMMARY");
        assert_eq!(data[0]["props"]["content"], "The NSE is open.");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = router(MockReasoningService::new(), Duration::from_secs(1));
        let (status, body) = post_completion(app, "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
        assert!(body.error.is_some());

        let app = router(
            MockReasoningService::new().fail("getOracles", "upstream 503"),
            Duration::from_secs(1),
        );
        let (status, _) = post_completion(app, "price of KQ").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let app = router(
            MockReasoningService::new()
                .respond("getOracles", json!({ "oracles": [] }))
                .with_latency(Duration::from_millis(200)),
            Duration::from_millis(10),
        );
        let (status, _) = post_completion(app, "price of KQ").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }
}
