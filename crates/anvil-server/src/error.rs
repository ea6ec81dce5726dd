//! Error types for Anvil server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Server error type (startup and serving, never per request).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("invalid {key}: {message}")]
    Config { key: &'static str, message: String },

    /// Invalid bind address.
    #[error("invalid address {0}")]
    Address(String),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// A failed request, rendered as a JSON body with an `error` discriminator.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or wrong `x-api-key`.
    #[error("invalid api key")]
    Unauthorized,

    /// `code` or `board` missing or empty.
    #[error("code and board required")]
    MissingFields,

    /// Body is not valid JSON or has wrongly typed fields.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Body exceeds the configured limit.
    #[error("payload too large")]
    PayloadTooLarge,

    /// A library failed to install.
    #[error("library '{library}' failed to install")]
    LibraryInstall { library: String, details: String },

    /// The toolchain failed to compile.
    #[error("compilation failed")]
    Compilation { details: String },

    /// The toolchain succeeded but produced no artifact.
    #[error("no binary produced")]
    NoBinary { build_dir: String },

    /// Unexpected failure (workspace IO and the like).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MissingFields | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::LibraryInstall { .. }
            | ApiError::Compilation { .. }
            | ApiError::NoBinary { .. }
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            ApiError::Unauthorized => json!({ "error": "invalid api key" }),
            ApiError::MissingFields => json!({ "error": "code and board required" }),
            ApiError::InvalidBody(details) => {
                json!({ "error": "invalid request body", "details": details })
            }
            ApiError::PayloadTooLarge => json!({ "error": "payload too large" }),
            ApiError::LibraryInstall { library, details } => json!({
                "error": "compilation_failed",
                "library": library,
                "details": details,
            }),
            ApiError::Compilation { details } => {
                json!({ "error": "compilation_failed", "details": details })
            }
            ApiError::NoBinary { build_dir } => {
                json!({ "error": "no binary produced", "buildDir": build_dir })
            }
            ApiError::Internal(details) => {
                json!({ "error": "internal_error", "details": details })
            }
        }
    }
}

impl From<anvil_core::Error> for ApiError {
    fn from(err: anvil_core::Error) -> Self {
        use anvil_core::Error;

        match err {
            Error::Validation(_) => ApiError::MissingFields,
            Error::LibraryInstall { library, details } => {
                ApiError::LibraryInstall { library, details }
            }
            Error::Compilation { details } => ApiError::Compilation { details },
            Error::ArtifactNotProduced { build_dir } => ApiError::NoBinary {
                build_dir: build_dir.display().to_string(),
            },
            other @ (Error::Io { .. } | Error::Internal(_)) => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (self.status(), Json(self.body())).into_response()
    }
}
