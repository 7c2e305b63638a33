//! REST API Server for the Personal Assistant
//!
//! Exposes the orchestrator, the record store, and the insight generators
//! via HTTP endpoints. Integrates with frontend UI.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::agent::Orchestrator;
use crate::context::AssistantContext;
use crate::error::AssistantError;
use crate::insights;
use crate::models::{ConversationTurn, Persona};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub persona: Option<String>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

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
    pub ctx: Arc<AssistantContext>,
    pub orchestrator: Arc<Orchestrator>,
}

fn fault_status(error: &AssistantError) -> StatusCode {
    match error {
        AssistantError::StorageUnavailable | AssistantError::StorageError(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AssistantError::Cancelled => StatusCode::REQUEST_TIMEOUT,
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
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message must not be empty".into())),
        );
    }

    let persona = req
        .persona
        .as_deref()
        .map(Persona::from_tag)
        .unwrap_or(Persona::GeneralAssistant);
    info!(persona = persona.tag(), "Received chat request");

    match state
        .orchestrator
        .send_message(&req.message, persona, &req.history)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "text": outcome.text,
                "actions": outcome.actions,
                "persona": persona.tag(),
            }))),
        ),
        Err(e) => (
            fault_status(&e),
            Json(ApiResponse::error(format!("Chat failed: {}", e))),
        ),
    }
}

/// =============================
/// Insight Endpoints
/// =============================

async fn insight_handler(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let result = match kind.as_str() {
        "finances" | "financial" => insights::financial_health(&state.ctx).await,
        "mood" => insights::mood_trend(&state.ctx).await,
        "schedule" => insights::schedule_tips(&state.ctx).await,
        other => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(format!("Unknown insight: {}", other))),
            )
        }
    };

    match result {
        Ok(text) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "kind": kind,
                "text": text,
            }))),
        ),
        Err(e) => (
            fault_status(&e),
            Json(ApiResponse::error(format!("Insight failed: {}", e))),
        ),
    }
}

async fn quote_handler(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    match insights::daily_quote(&state.ctx).await {
        Ok(text) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "quote": text }))),
        ),
        Err(e) => (
            fault_status(&e),
            Json(ApiResponse::error(format!("Quote failed: {}", e))),
        ),
    }
}

/// =============================
/// History Endpoint
/// =============================

async fn history_handler(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    match state.ctx.store.list_chat_messages().await {
        Ok(messages) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "messages": messages,
            }))),
        ),
        Err(e) => (
            fault_status(&e),
            Json(ApiResponse::error(format!("History lookup failed: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(ctx: Arc<AssistantContext>) -> Router {
    let state = ApiState {
        orchestrator: Arc::new(Orchestrator::new(Arc::clone(&ctx))),
        ctx,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/history", get(history_handler))
        .route("/api/insights/:kind", get(insight_handler))
        .route("/api/quote", get(quote_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    ctx: Arc<AssistantContext>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(ctx);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
