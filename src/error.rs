//! Error types for the search subsystem

use thiserror::Error;

/// Result type alias for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Timeout reported when reqwest gives up without telling us the configured limit
const DEFAULT_TIMEOUT_MS: u64 = 15000;

/// Comprehensive error types for search operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// HTTP request failed
    #[error("HTTP request failed: {message}")]
    HttpError {
        message: String,
        status_code: Option<u16>,
        response_body: Option<String>,
    },

    /// Invalid input parameters (never retried)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error (missing credentials, bad settings)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed provider payload (JSON, HTML)
    #[error("Parsing error: {0}")]
    ParseError(String),

    /// Timeout error
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Generic error for unhandled cases
    #[error("Search error: {0}")]
    Other(String),
}

impl SearchError {
    /// Whether the error comes from a provider call and should trigger fallback
    /// to the next provider rather than being reported to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SearchError::HttpError { .. }
                | SearchError::ProviderError(_)
                | SearchError::ParseError(_)
                | SearchError::Timeout { .. }
                | SearchError::RateLimit(_)
                | SearchError::AuthenticationError(_)
        )
    }

    /// HTTP status code carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SearchError::HttpError { status_code, .. } => *status_code,
            SearchError::RateLimit(_) => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            SearchError::Timeout {
                timeout_ms: DEFAULT_TIMEOUT_MS,
            }
        } else if error.is_status() {
            let status_code = error.status().map(|s| s.as_u16());
            let message = error.to_string();

            if let Some(401 | 403) = status_code {
                SearchError::AuthenticationError(message)
            } else if let Some(429) = status_code {
                SearchError::RateLimit(message)
            } else {
                SearchError::HttpError {
                    message,
                    status_code,
                    response_body: None,
                }
            }
        } else if error.is_decode() {
            SearchError::ParseError(format!("Response decoding failed: {error}"))
        } else {
            SearchError::HttpError {
                message: error.to_string(),
                status_code: None,
                response_body: None,
            }
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(error: serde_json::Error) -> Self {
        SearchError::ParseError(format!("JSON parsing failed: {error}"))
    }
}

impl From<url::ParseError> for SearchError {
    fn from(error: url::ParseError) -> Self {
        SearchError::InvalidInput(format!("Invalid URL: {error}"))
    }
}
