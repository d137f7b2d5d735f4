//! Error types for the fact checker
//!
//! Two layers:
//! - Pipeline errors (`CheckError`, `ResearchError`, `ReasoningError`) that
//!   the engine raises and mostly absorbs into degraded claim results
//! - `AppError`, the HTTP-facing error with status mapping and a
//!   structured response body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of a single Research Gateway query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResearchError {
    #[error("search timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("research budget exhausted before the query was issued")]
    BudgetExhausted,

    #[error("search transport failure: {0}")]
    Transport(String),

    #[error("search backend answered with status {status}")]
    Status { status: u16 },

    #[error("search returned no results")]
    Empty,

    #[error("search response could not be parsed: {0}")]
    Malformed(String),
}

impl ResearchError {
    /// Whether this failure came from running out of time rather than
    /// from the backend itself
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResearchError::Timeout { .. } | ResearchError::BudgetExhausted)
    }
}

/// Failure of the external reasoning capability (decomposition or scoring)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasoningError {
    #[error("reasoning call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("reasoning transport failure: {0}")]
    Transport(String),

    #[error("reasoning backend answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("reasoning response was malformed: {0}")]
    Malformed(String),
}

/// Pipeline error taxonomy
///
/// Only `Extraction` (and `Timeout` before extraction completes) ever fail
/// a whole run; the rest are absorbed per claim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("claim extraction failed: {reason}")]
    Extraction { reason: String },

    #[error("invalid claim: {reason}")]
    Validation { reason: String },

    #[error("run timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl From<ReasoningError> for CheckError {
    fn from(err: ReasoningError) -> Self {
        CheckError::Extraction {
            reason: err.to_string(),
        }
    }
}

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,
    PayloadTooLarge,

    // Pipeline errors (4xxx)
    ExtractionFailed,
    RunTimeout,

    // Rate limiting (6xxx)
    RateLimited,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::PayloadTooLarge => 1004,

            ErrorCode::ExtractionFailed => 4001,
            ErrorCode::RunTimeout => 4002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Payload too large: request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Claim extraction failed: {message}")]
    Extraction { message: String },

    #[error("Fact check timed out after {timeout_ms}ms")]
    RunTimeout { timeout_ms: u64 },

    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::Extraction { .. } => ErrorCode::ExtractionFailed,
            AppError::RunTimeout { .. } => ErrorCode::RunTimeout,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidFormat { .. }
            | AppError::Extraction { .. } => StatusCode::BAD_REQUEST,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. } | AppError::Configuration { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // 504 Gateway Timeout
            AppError::RunTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<CheckError> for AppError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Extraction { reason } => AppError::Extraction { message: reason },
            CheckError::Timeout { after_ms } => AppError::RunTimeout {
                timeout_ms: after_ms,
            },
            // Absorbed per claim by the engine; surfacing one here is a bug.
            other @ CheckError::Validation { .. } => AppError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();
        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
