//! Parsed API responses and terminal API errors.

use crate::error::ConfigurationError;

/// Classification of an error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    Exception,
}

/// Structured error reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeError {
    pub kind: ErrorKind,
    pub code: Option<String>,
    pub messages: Vec<String>,
}

impl EnvelopeError {
    pub fn rate_limited(messages: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::RateLimited,
            code: None,
            messages,
        }
    }

    pub fn exception(code: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::Exception,
            code: Some(code.into()),
            messages,
        }
    }
}

/// One parsed response: either a payload or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponseEnvelope<T> {
    Success(T),
    Error(EnvelopeError),
}

/// The body could not be understood at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unparseable response body: {0}")]
pub struct UnparseableBody(pub String);

impl From<serde_json::Error> for UnparseableBody {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Transport,
    RateLimited,
    Exception,
    Malformed,
    Configuration,
}

/// Terminal outcome of a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Transport failed after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    #[error("Rate limited after {attempts} attempt(s): {}", .messages.join("; "))]
    RateLimited { attempts: u32, messages: Vec<String> },

    #[error("API exception {}: {}", .code.as_deref().unwrap_or("unknown"), .messages.join("; "))]
    Exception {
        code: Option<String>,
        messages: Vec<String>,
    },

    #[error("Malformed success response: {0}")]
    Malformed(String),

    #[error("Could not build request: {0}")]
    Signing(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::Transport { .. } => ApiErrorKind::Transport,
            ApiError::RateLimited { .. } => ApiErrorKind::RateLimited,
            ApiError::Exception { .. } => ApiErrorKind::Exception,
            ApiError::Malformed(_) => ApiErrorKind::Malformed,
            ApiError::Signing(_) | ApiError::Configuration(_) => ApiErrorKind::Configuration,
        }
    }
}
