//! Standardized error handling for the report service
//! Provides the error taxonomy, HTTP status mapping, and the failure envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, warn};

use crate::dto::ReportResponse;

/// Literal message returned when the date range is absent
pub const MISSING_DATE_RANGE_MESSAGE: &str = "'dateRange.start' and 'dateRange.end' are required.";

/// Error types produced while serving a report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Malformed filter payload: {message}")]
    MalformedPayload { message: String },

    #[error("{}", MISSING_DATE_RANGE_MESSAGE)]
    MissingDateRange,

    #[error("'dateRange.start' ({start}) must not be after 'dateRange.end' ({end}).")]
    InvalidDateRange { start: i64, end: i64 },

    #[error("Column '{column}' is not available for reporting")]
    InvalidColumn { column: String },

    #[error("Invalid page: {message}")]
    InvalidPage { message: String },

    #[error("Missing required capability '{capability}'")]
    Unauthorized { capability: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Query execution failed: {message}")]
    Execution {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ReportError {
    /// Create a malformed payload error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Create an invalid column error
    pub fn invalid_column<S: Into<String>>(column: S) -> Self {
        Self::InvalidColumn {
            column: column.into(),
        }
    }

    /// Create an invalid page error
    pub fn invalid_page<S: Into<String>>(message: S) -> Self {
        Self::InvalidPage {
            message: message.into(),
        }
    }

    /// Create an execution error
    pub fn execution<S: Into<String>>(message: S) -> Self {
        Self::Execution {
            message: message.into(),
            source: None,
        }
    }

    /// Create an execution error with source
    pub fn execution_with_source<S: Into<String>>(message: S, source: anyhow::Error) -> Self {
        Self::Execution {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Get the error code for logs and diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "MALFORMED_PAYLOAD",
            Self::MissingDateRange => "MISSING_DATE_RANGE",
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::InvalidColumn { .. } => "INVALID_COLUMN",
            Self::InvalidPage { .. } => "INVALID_PAGE",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Authentication { .. } => "AUTH_ERROR",
            Self::Execution { .. } => "EXECUTION_ERROR",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedPayload { .. }
            | Self::MissingDateRange
            | Self::InvalidDateRange { .. }
            | Self::InvalidColumn { .. }
            | Self::InvalidPage { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized { .. } => StatusCode::FORBIDDEN,
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Validation and authorization failures are expected outcomes.
    /// Only execution errors mean the request failed.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Execution { .. })
    }

    /// Convert to the failure envelope
    pub fn to_response(&self) -> ReportResponse {
        ReportResponse::failure(self.status_code().as_u16(), self.to_string())
    }
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            ReportError::Execution { .. } => {
                error!(code = self.error_code(), "Internal error: {}", self);
            }
            ReportError::Unauthorized { .. } | ReportError::Authentication { .. } => {
                warn!(code = self.error_code(), "Access denied: {}", self);
            }
            _ => {
                info!(code = self.error_code(), "Client error: {}", self);
            }
        }

        (status, Json(self.to_response())).into_response()
    }
}

/// Result type alias for report operations
pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Trait for attaching report context to foreign errors
pub trait ErrorContext<T> {
    fn with_payload_context<F>(self, f: F) -> ReportResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn with_payload_context<F>(self, f: F) -> ReportResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let source: anyhow::Error = e.into();
            ReportError::malformed(format!("{}: {}", f(), source))
        })
    }
}
