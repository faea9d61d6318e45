//! Lookup transport error types

use std::time::Duration;

/// Errors a [`Transport`](crate::lookup::Transport) can report for a lookup call.
///
/// These never reach the caller of an edit. The lookup coordinator folds
/// every variant into [`LookupStatus::Unavailable`](crate::state::LookupStatus).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Non-success HTTP response from the verification service.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured timeout.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body was not a readable payload.
    #[error("Response parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Raw response body, if available.
        body: Option<String>,
    },
}

impl TransportError {
    /// Creates a new HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates a new parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: None,
        }
    }

    /// Creates a new parse error with the raw response body.
    pub fn parse_with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if a later attempt could plausibly succeed.
    ///
    /// Informational only: lookups are retried when the user edits the
    /// value, never automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Network(_) | Self::Timeout(_) => true,
            Self::InvalidUrl(_) | Self::Parse { .. } => false,
        }
    }
}
