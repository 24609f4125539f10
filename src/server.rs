use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::HeaderValue,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    auth::BearerToken,
    config::AppConfig,
    error::ServiceError,
    model::{
        ChatAdapter, ChatRequest, ChatResponse, GenerateRequest, GenerateResponse, ModelInfo,
        ModelRegistry,
    },
    upstream::CompletionBackend,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub adapter: Arc<ChatAdapter>,
    pub registry: Arc<ModelRegistry>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    azure_endpoint: Option<String>,
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
}

pub fn build_router(config: Arc<AppConfig>, backend: Arc<dyn CompletionBackend>) -> Router {
    let cors = cors_layer(&config.allowed_origins);
    let state = AppState {
        adapter: Arc::new(ChatAdapter::new(backend)),
        registry: Arc::new(ModelRegistry::from_config(&config)),
        config,
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v1/models", get(list_models))
        .route("/api/v1/chat/completions", post(chat_completion))
        .route("/api/v1/generate", post(generate_text))
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Azure Foundry API is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// Never calls the vendor; liveness only.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "Azure Foundry API is running",
        azure_endpoint: Some(state.config.endpoint.clone()),
    })
}

async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(state.registry.list().to_vec())
}

async fn chat_completion(
    State(state): State<AppState>,
    _token: BearerToken,
    WithRejection(Json(request), _): WithRejection<Json<ChatRequest>, ServiceError>,
) -> Result<Json<ChatResponse>, ServiceError> {
    let response = state.adapter.chat(request, &state.config).await?;
    Ok(Json(response))
}

async fn generate_text(
    State(state): State<AppState>,
    _token: BearerToken,
    WithRejection(Json(request), _): WithRejection<Json<GenerateRequest>, ServiceError>,
) -> Result<Json<GenerateResponse>, ServiceError> {
    let response = state.adapter.generate(request, &state.config).await?;
    Ok(Json(response))
}

async fn not_found() -> ServiceError {
    ServiceError::NotFound
}
