//! Error responses for the HTTP surface

use std::any::Any;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use runcell::ExecuteError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was rejected before anything ran
    #[error("{message}")]
    Invalid {
        status: StatusCode,
        message: String,
        supported: Vec<String>,
    },

    /// No execution slot became free in time
    #[error("{0}")]
    Busy(String),

    /// The service failed while handling an accepted request
    #[error("{message}")]
    Internal {
        execution_id: Option<String>,
        language: String,
        message: String,
        stderr: String,
    },
}

impl ApiError {
    /// Map a body that could not be read or parsed
    ///
    /// Syntax and shape errors become 400; size and content-type errors
    /// keep their own status (413, 415).
    pub fn rejected(rejection: JsonRejection, supported: Vec<String>) -> Self {
        let status = match rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                StatusCode::BAD_REQUEST
            }
            ref other => other.status(),
        };
        Self::Invalid {
            status,
            message: format!("Invalid request body: {}", rejection.body_text()),
            supported,
        }
    }

    /// Map a pipeline error for the request that produced it
    pub fn from_execute(err: ExecuteError, language: &str, supported: Vec<String>) -> Self {
        match err {
            ExecuteError::Request(e) => Self::Invalid {
                status: StatusCode::BAD_REQUEST,
                message: e.to_string(),
                supported,
            },
            ExecuteError::Prepare { source, .. } => Self::Invalid {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: source.to_string(),
                supported,
            },
            ref e if e.is_busy() => {
                warn!(language, "rejecting request, no execution slot");
                Self::Busy(e.to_string())
            }
            e => {
                let execution_id = e.execution_id().map(|id| id.to_string());
                error!(
                    execution_id = execution_id.as_deref().unwrap_or("-"),
                    language,
                    error = %e,
                    "execution failed"
                );
                Self::Internal {
                    execution_id,
                    language: language.to_owned(),
                    message: e.to_string(),
                    stderr: e.stderr(),
                }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Invalid { status, .. } => *status,
            ApiError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Invalid {
                message, supported, ..
            } => json!({
                "success": false,
                "error": message,
                "supportedLanguages": supported,
            }),
            ApiError::Busy(message) => json!({
                "success": false,
                "error": message,
            }),
            ApiError::Internal {
                execution_id,
                language,
                message,
                stderr,
            } => json!({
                "success": false,
                "executionId": execution_id,
                "language": language,
                "error": message,
                "output": "",
                "stderr": stderr,
                "exitCode": null,
            }),
        };
        (status, Json(body)).into_response()
    }
}

/// Response sent when a handler panics
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    error!(panic = detail, "request handler panicked");

    let body = json!({
        "success": false,
        "error": "Internal server error",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
