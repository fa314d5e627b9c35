//! Error types for the gatekeeper library.

use thiserror::Error;

/// The main error type for all gate operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// Invalid rate limit or cache configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cache backend failure
    #[error("Cache backend error: {0}")]
    CacheBackend(#[from] CacheError),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// The upstream API answered with a non-success status
    #[error("API error: {0}")]
    Api(ApiError),

    /// Request timeout
    #[error("Request timed out")]
    Timeout,
}

impl GateError {
    /// Build a configuration error from any message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Failures of the storage behind a cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Embedded database failure
    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    /// Entry encoding failure
    #[error("entry encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Filesystem failure around the database file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by the upstream API.
///
/// Carries the HTTP status and the message extracted from the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Human-readable error message
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.message)
    }
}

impl ApiError {
    /// Create a new API error from status and message.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Parse an error body of the form `{"status": {"message": "..."}}`.
    ///
    /// Falls back to the raw body, or a generic message when the body is empty.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/status/message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    "Unknown error".to_string()
                } else {
                    body.to_string()
                }
            });
        Self::new(status, message)
    }

    /// Check if the upstream rejected the call for exceeding its rate limit.
    pub fn is_rate_limit(&self) -> bool {
        self.status == 429
    }

    /// Check if the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Check if the API key is missing or invalid.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Check if access to the resource is forbidden.
    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    /// Check if the upstream failed internally.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_json_body() {
        let body = r#"{"status": {"message": "Data not found", "status_code": 404}}"#;
        let error = ApiError::from_body(404, body);
        assert_eq!(error.message, "Data not found");
        assert!(error.is_not_found());
        assert!(!error.is_rate_limit());
    }

    #[test]
    fn test_api_error_from_plain_body() {
        let error = ApiError::from_body(503, "upstream busy");
        assert_eq!(error.message, "upstream busy");
        assert!(error.is_server_error());

        let empty = ApiError::from_body(429, "  ");
        assert_eq!(empty.message, "Unknown error");
        assert!(empty.is_rate_limit());
    }

    #[test]
    fn test_api_error_display() {
        let error = ApiError::new(403, "Forbidden");
        assert_eq!(error.to_string(), "HTTP 403: Forbidden");
        assert!(error.is_forbidden());
    }
}
