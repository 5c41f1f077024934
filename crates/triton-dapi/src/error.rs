//! Error types for the placement engine.
//!
//! Mirrors the shape of [`triton_core::error::Error`] (flat `thiserror` enum,
//! `error_code()`, structured [`ErrorResponse`]) but with allocation-specific
//! variants, since this crate never touches HTTP transport.

use serde::Serialize;
use thiserror::Error;

/// Errors produced by validation, derivation, and the allocator facade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// One of the request inputs (VM, image, package, ticket, or defaults)
    /// failed validation before the pipeline ran.
    #[error("invalid input field `{field}`: {reason}")]
    InputInvalid {
        /// Dotted path of the offending field, e.g. `vm.ram`.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// An algorithm description named a stage that is not registered.
    #[error("unknown algorithm stage: {0}")]
    UnknownStage(String),

    /// An algorithm description was structurally invalid (e.g. an empty
    /// `pipe` or `or`).
    #[error("invalid algorithm description: {0}")]
    InvalidAlgorithmDescription(String),

    /// The pipeline ran to completion but no server survived.
    #[error("no servers available: {0}")]
    NoServersAvailable(String),

    /// A built-in test-only stage forced a failure.
    #[error("forced failure: {0}")]
    ForcedFailure(String),

    /// An internal invariant was violated; this should never surface from a
    /// well-formed call and indicates a bug in the engine itself.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Specialized result type for the placement engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response, matching `triton_core::error::ErrorResponse`'s
/// shape for hosts that want to serialize an allocation failure the same way
/// they serialize a `triton-core` client error.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InputInvalid { .. } => "INPUT_INVALID",
            Self::UnknownStage(_) => "UNKNOWN_STAGE",
            Self::InvalidAlgorithmDescription(_) => "INVALID_ALGORITHM_DESCRIPTION",
            Self::NoServersAvailable(_) => "NO_SERVERS_AVAILABLE",
            Self::ForcedFailure(_) => "FORCED_FAILURE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Converts the error into an [`ErrorResponse`].
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        }
    }

    /// Convenience constructor for [`Error::InputInvalid`].
    pub fn input_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<triton_core::Error> for Error {
    fn from(err: triton_core::Error) -> Self {
        Self::InputInvalid {
            field: "uuid".to_string(),
            reason: err.to_string(),
        }
    }
}
