//! Per-call fetch and cache options.

use std::collections::BTreeMap;

use http::Method;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::transport::TransportRequest;

/// Transport options for a single fetch.
///
/// These are the options that make up the request signature, so two calls
/// with equal options share a cache entry. Header names are lowercased on
/// insert since HTTP treats them case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// HTTP method.
    pub method: Method,
    /// Request headers (lowercased names).
    pub headers: BTreeMap<String, String>,
    /// JSON body.
    pub body: Option<Value>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl FetchOptions {
    /// Options for a GET request.
    pub fn get() -> Self {
        Self::with_method(Method::GET)
    }

    /// Options for a POST request.
    pub fn post() -> Self {
        Self::with_method(Method::POST)
    }

    /// Options with an explicit method.
    pub fn with_method(method: Method) -> Self {
        Self {
            method,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Add a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Set a JSON body from a raw value.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a JSON body by serializing `value`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    /// The option set as JSON, the input to the request signature.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "method".to_string(),
            Value::String(self.method.as_str().to_string()),
        );
        if !self.headers.is_empty() {
            let headers = self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            map.insert("headers".to_string(), Value::Object(headers));
        }
        if let Some(body) = &self.body {
            map.insert("body".to_string(), body.clone());
        }
        Value::Object(map)
    }

    /// Build the wire request, adding JSON content negotiation headers.
    pub fn to_transport_request(&self, url: &str) -> TransportRequest {
        let mut headers = self.headers.clone();
        headers.insert("accept".to_string(), "application/json".to_string());

        let body = self.body.as_ref().map(|b| {
            headers.insert("content-type".to_string(), "application/json".to_string());
            b.to_string().into_bytes()
        });

        TransportRequest {
            method: self.method.clone(),
            url: url.to_string(),
            headers,
            body,
        }
    }
}

/// Cache behaviour for a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Read from and write to the session cache.
    pub cache: bool,
    /// Skip any cached value and overwrite it on success.
    pub refresh: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache: true,
            refresh: false,
        }
    }
}

impl CacheOptions {
    /// Never read or write the cache.
    pub fn no_cache() -> Self {
        Self {
            cache: false,
            refresh: false,
        }
    }

    /// Always fetch, then overwrite the cached value.
    pub fn refresh() -> Self {
        Self {
            cache: true,
            refresh: true,
        }
    }
}
