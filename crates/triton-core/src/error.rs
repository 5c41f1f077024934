//! Error types for Triton operations.
//!
//! This module provides a comprehensive error type hierarchy for Triton DataCenter operations,
//! including HTTP status code mapping and structured error responses.

use serde::Serialize;
use thiserror::Error;

/// Main error type for Triton operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Triton service is unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Service discovery failed
    #[error("Service discovery failed: {0}")]
    DiscoveryFailed(String),

    /// Failed to parse SAPI response
    #[error("Failed to parse SAPI response: {0}")]
    SapiParseError(String),

    /// Invalid UUID format
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    /// Invalid network configuration
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),

    /// Invalid VM state
    #[error("Invalid VM state: {0}")]
    InvalidVmState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timeout waiting for service: {0}")]
    Timeout(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Bad request with details
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External service error
    #[error("External service error: {service}: {message}")]
    ExternalServiceError {
        /// Service name that failed
        service: String,
        /// Error message
        message: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Endpoint cache error
    #[error("Endpoint cache error: {0}")]
    CacheError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Specialized result type for Triton operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Optional request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::DiscoveryFailed(_) => "DISCOVERY_FAILED",
            Self::SapiParseError(_) => "SAPI_PARSE_ERROR",
            Self::InvalidUuid(_) => "INVALID_UUID",
            Self::InvalidNetwork(_) => "INVALID_NETWORK",
            Self::InvalidVmState(_) => "INVALID_VM_STATE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::ExternalServiceError { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        self.into_error_response_with_id(None)
    }

    /// Converts the error into an `ErrorResponse` with a request ID.
    #[must_use]
    pub fn into_error_response_with_id(self, request_id: Option<String>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details: None,
            },
            request_id,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::InternalError(_) | Self::ConfigError(_) | Self::ExternalServiceError { .. }
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::SapiParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidUuid(err.to_string())
    }
}
