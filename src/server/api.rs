use crate::llm::GenerationClient;
use crate::models::proxy::{ ErrorBody, PromptRequest };
use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::State,
    http::{ Method, StatusCode },
    response::{ IntoResponse, Response },
    routing::any,
    Json,
    Router,
};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

pub const CHAT_ROUTE: &str = "/api/chat";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Missing systemPrompt")]
    BadRequest,
    #[error("GEMINI_API_KEY is not configured on the server")]
    ServerMisconfigured,
    #[error("Failed to fetch from Gemini API")]
    UpstreamFailure {
        status: StatusCode,
    },
    #[error("Internal Server Error")]
    InternalFailure,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::BadRequest => StatusCode::BAD_REQUEST,
            ProxyError::ServerMisconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UpstreamFailure { status } => *status,
            ProxyError::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Shared, read-only request state. `generator` is `None` when no API key was configured.
#[derive(Clone)]
pub struct AppState {
    pub generator: Option<Arc<dyn GenerationClient>>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(CHAT_ROUTE, any(chat_handler))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

async fn chat_handler(
    method: Method,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ProxyError> {
    if method != Method::POST {
        return Err(ProxyError::MethodNotAllowed);
    }

    let request: PromptRequest = serde_json::from_slice(&body).unwrap_or_default();
    let prompt = request.system_prompt
        .filter(|p| !p.is_empty())
        .ok_or(ProxyError::BadRequest)?;

    let generator = state.generator.as_ref().ok_or(ProxyError::ServerMisconfigured)?;

    info!("Forwarding prompt ({} chars) to model {}", prompt.chars().count(), generator.get_model());
    match generator.generate(&prompt).await {
        Ok(payload) => Ok(Json(payload)),
        Err(crate::llm::GenerationError::Status { status, body }) => {
            error!("Gemini API Error: {} {}", status, body);
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            Err(ProxyError::UpstreamFailure { status })
        }
        Err(e) => {
            error!("Server Error: {}", e);
            Err(ProxyError::InternalFailure)
        }
    }
}
