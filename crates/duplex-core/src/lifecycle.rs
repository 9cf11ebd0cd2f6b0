//! Request timing and response lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use http::header::{HeaderName, HeaderValue, LOCATION};
use http::{HeaderMap, StatusCode};

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Time from request start to a recorded mark.
    pub fn since_start(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle phase of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePhase {
    /// Status and body may still change.
    Open,
    /// Status and body are final; completion hooks may run.
    Finalized,
}

/// Error type for response mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    #[error("Response already finalized")]
    AlreadyFinalized,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Response under construction for a single exchange.
///
/// A response moves from `Open` to `Finalized` exactly once. Analytics only
/// observe a response after it is finalized, so the logged status code is
/// the one the client actually received.
#[derive(Debug, Clone)]
pub struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    phase: ResponsePhase,
    replace_history: bool,
}

impl ResponseState {
    /// Create an open response with status 200.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            phase: ResponsePhase::Open,
            replace_history: false,
        }
    }

    /// Current status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Set the status without finalizing.
    pub fn set_status(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.status = status;
        Ok(())
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set a header.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ResponseError> {
        self.ensure_open()?;
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ResponseError::InvalidHeader(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ResponseError::InvalidHeader(name.to_string()))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.body = body.into();
        Ok(())
    }

    /// Current phase.
    pub fn phase(&self) -> ResponsePhase {
        self.phase
    }

    /// Whether the response has been finalized.
    pub fn is_finalized(&self) -> bool {
        self.phase == ResponsePhase::Finalized
    }

    /// Set the final status and close the response.
    pub fn finalize(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.status = status;
        self.phase = ResponsePhase::Finalized;
        Ok(())
    }

    /// Finalize as a `302` redirect to `location`.
    ///
    /// `replace` asks a live session to replace the current history entry
    /// instead of pushing a new one.
    pub fn redirect(&mut self, location: &str, replace: bool) -> Result<(), ResponseError> {
        self.ensure_open()?;
        let value = HeaderValue::from_str(location)
            .map_err(|_| ResponseError::InvalidHeader(LOCATION.to_string()))?;
        self.headers.insert(LOCATION, value);
        self.replace_history = replace;
        self.finalize(StatusCode::FOUND)
    }

    /// Redirect target, if this response is a redirect.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Whether a redirect should replace the current history entry.
    pub fn replaces_history(&self) -> bool {
        self.replace_history
    }

    /// Convert into an `http::Response`.
    pub fn into_http(self) -> http::Response<Vec<u8>> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    fn ensure_open(&self) -> Result<(), ResponseError> {
        match self.phase {
            ResponsePhase::Open => Ok(()),
            ResponsePhase::Finalized => Err(ResponseError::AlreadyFinalized),
        }
    }
}

impl Default for ResponseState {
    fn default() -> Self {
        Self::new()
    }
}
