//! Error types for Netskope operations.
//!
//! Every failure surfaced by the client crates is one of these variants. They
//! fall into four groups: transport failures, malformed response bodies,
//! business errors reported by the API, and errors raised while building a
//! request before anything is sent.

use thiserror::Error;

/// Main error type for Netskope operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Connection could not be established (DNS, refused, TLS)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Request timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Other transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Response body could not be decoded into the expected shape
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The API reported `status: "error"` with a message
    #[error("API error: {0}")]
    Api(String),

    /// The envelope status was neither the expected success value nor a
    /// recognised error
    #[error("Unknown status: {status}")]
    UnknownStatus {
        /// Status value as received
        status: String,
        /// Server message, when one was supplied
        message: Option<String>,
    },

    /// HTTP status outside `[200, 400)`
    #[error("HTTP status {status}: {message}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Server message or a generic description
        message: String,
    },

    /// Request body could not be serialized
    #[error("Failed to serialize request: {0}")]
    Serialization(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Invalid resource identifier
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    /// The call was cancelled before it completed
    #[error("Request cancelled")]
    Cancelled,
}

/// Specialized result type for Netskope operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::Api(_) => "API_ERROR",
            Self::UnknownStatus { .. } => "UNKNOWN_STATUS",
            Self::HttpStatus { .. } => "HTTP_STATUS",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::InvalidId(_) => "INVALID_ID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns true for network-level failures (connect, DNS, TLS, timeout).
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_) | Self::Timeout(_) | Self::HttpError(_)
        )
    }

    /// Returns true when the API itself reported the failure.
    #[must_use]
    pub const fn is_business(&self) -> bool {
        matches!(
            self,
            Self::Api(_) | Self::UnknownStatus { .. } | Self::HttpStatus { .. }
        )
    }

    /// Returns the server-supplied message, if the error carries one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api(message) | Self::HttpStatus { message, .. } => Some(message),
            Self::UnknownStatus { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
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
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
