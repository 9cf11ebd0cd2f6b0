//! Network seam for outbound requests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use http::Method;
use serde::de::DeserializeOwned;

use crate::error::{FetchError, TransportError};

/// A request ready to go on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL or path.
    pub url: String,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

/// A raw response from the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The response headers.
    pub headers: HashMap<String, String>,
    /// The response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Create a new response.
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a response carrying a JSON body.
    pub fn json_body(status: u16, body: &serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self::new(status, headers, body.to_string().into_bytes())
    }

    /// Check if the response was successful (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_slice(&self.body).map_err(FetchError::decode)
    }
}

/// Sends requests over the network.
///
/// Implementations report every response they receive, success or not;
/// only failures to obtain a response are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the response.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Prefix relative targets with a base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn resolve(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if !url.starts_with("http://") && !url.starts_with("https://") => {
                format!("{}{}", base.trim_end_matches('/'), url)
            }
            _ => url.to_string(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = self.resolve(&request.url);
        let mut builder = self.client.request(request.method, url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else if e.is_builder() {
                TransportError::Request(e.to_string())
            } else {
                TransportError::Connection(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?
            .to_vec();

        Ok(TransportResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_is_success() {
        assert!(TransportResponse::new(200, HashMap::new(), vec![]).is_success());
        assert!(TransportResponse::new(204, HashMap::new(), vec![]).is_success());
        assert!(!TransportResponse::new(404, HashMap::new(), vec![]).is_success());
        assert!(!TransportResponse::new(500, HashMap::new(), vec![]).is_success());
    }

    #[test]
    fn test_response_json() {
        let response = TransportResponse::json_body(200, &json!({"id": 7}));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_response_invalid_json_is_500() {
        let response = TransportResponse::new(200, HashMap::new(), b"not json".to_vec());
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert_eq!(err.status_code, 500);
    }

    #[test]
    fn test_base_url_resolution() {
        let transport = ReqwestTransport::new().with_base_url("https://api.test/");
        assert_eq!(transport.resolve("/items"), "https://api.test/items");
        assert_eq!(transport.resolve("https://other.test/x"), "https://other.test/x");
        assert_eq!(ReqwestTransport::new().resolve("/items"), "/items");
    }
}
