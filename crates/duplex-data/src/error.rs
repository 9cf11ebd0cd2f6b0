//! Fetch error types.

use http::StatusCode;

/// Typed failure of a data fetch.
///
/// Non-success responses keep their status code. Transport failures get a
/// synthetic 500-class status so callers see one error shape regardless of
/// where the failure came from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP {status_code}: {message}")]
pub struct FetchError {
    /// Response status, or a synthetic 5xx for transport failures.
    pub status_code: u16,
    /// Human-readable description.
    pub message: String,
}

impl FetchError {
    /// Create a new fetch error.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// Error for a non-success response status.
    pub fn from_status(status_code: u16) -> Self {
        Self::new(status_code, format!("HTTP error, status = {}", status_code))
    }

    /// Error for a response body that could not be decoded.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            format!("Failed to fetch: {}", err),
        )
    }

    /// Status as an `http::StatusCode`, falling back to 500.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Check if this is a client error (4xx status).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// Check if this is a server or transport error (5xx status).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }
}

/// Errors raised by a [`crate::Transport`] before a response is available.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Body error: {0}")]
    Body(String),
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        let status = match err {
            TransportError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        FetchError::new(status.as_u16(), format!("Failed to fetch: {}", err))
    }
}
