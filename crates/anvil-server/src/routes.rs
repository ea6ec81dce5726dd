//! HTTP routes for Anvil server.

use std::sync::Arc;

use anvil_core::{CompileRequest, CompiledArtifact, Compiler, Stage};
use axum::{
    Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Text served at `/`.
pub const INDEX_TEXT: &str = "Arduino Compiler API is running";

/// Application state shared across handlers.
pub struct AppState {
    /// Compile pipeline.
    pub compiler: Compiler,
    /// Required API key; `None` disables the check.
    pub api_key: Option<String>,
    /// Maximum accepted request body, in bytes.
    pub body_limit: usize,
}

/// Body of `POST /compile`.
///
/// Every field is optional at the JSON level so that a missing field is
/// reported as such rather than as a parse error.
#[derive(Debug, Default, Deserialize)]
pub struct CompileBody {
    pub code: Option<String>,
    pub board: Option<String>,
    pub libraries: Option<Vec<String>>,
}

impl CompileBody {
    /// Convert into a core request, rejecting missing or empty required fields.
    pub fn into_request(self) -> Result<CompileRequest, ApiError> {
        match (self.code, self.board) {
            (Some(code), Some(board)) if !code.is_empty() && !board.is_empty() => {
                Ok(CompileRequest::new(code, board).with_libraries(self.libraries.unwrap_or_default()))
            }
            _ => Err(ApiError::MissingFields),
        }
    }
}

/// Successful `POST /compile` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompileResponse {
    /// Artifact file name.
    pub filename: String,
    /// Base64-encoded artifact.
    pub binary: String,
}

impl From<CompiledArtifact> for CompileResponse {
    fn from(artifact: CompiledArtifact) -> Self {
        Self {
            filename: artifact.filename,
            binary: BASE64.encode(&artifact.bytes),
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.body_limit;

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/compile", post(compile_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness text.
async fn index_handler() -> &'static str {
    INDEX_TEXT
}

/// Health check handler.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Compile a sketch.
///
/// The API key is checked before the body is looked at, and the body is
/// validated before any workspace exists.
async fn compile_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CompileBody>, JsonRejection>,
) -> Result<Json<CompileResponse>, ApiError> {
    authorize(state.api_key.as_deref(), &headers)?;

    let Json(body) = body.map_err(reject_body)?;
    let request = body.into_request()?;

    let artifact = state.compiler.compile(&request).await?;
    let response = CompileResponse::from(artifact);
    tracing::debug!(stage = %Stage::Encoded, "Stage reached");
    Ok(Json(response))
}

/// Check the `x-api-key` header against the configured key.
fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = expected.filter(|key| !key.is_empty()) else {
        return Ok(());
    };

    let provided = headers
        .get(API_KEY_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();

    if constant_time_eq(provided, expected.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Byte comparison whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn reject_body(rejection: JsonRejection) -> ApiError {
    match rejection {
        // No JSON content type: treated as an empty body, so fields are missing.
        JsonRejection::MissingJsonContentType(_) => ApiError::MissingFields,
        rejection if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::PayloadTooLarge
        }
        rejection => ApiError::InvalidBody(rejection.body_text()),
    }
}
