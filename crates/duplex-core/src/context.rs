//! Request context with typed accessors.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use http::header::{HeaderName, HeaderValue, COOKIE, REFERER, USER_AGENT};
use http::{HeaderMap, Method, Version};

use crate::lifecycle::TimingContext;

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

static REQUEST_SEQ: AtomicU32 = AtomicU32::new(0);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:x}-{:x}", nanos, seq))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed request context handed to view code, the data client and analytics.
///
/// The same structure describes a fresh document request on the server and a
/// logical navigation inside a running client session.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// HTTP method.
    pub method: Method,
    /// Original URL as requested, including the query string.
    pub url: String,
    /// Mount point of the handling router (prefix for `base_action`).
    pub base_url: String,
    /// HTTP version.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
    /// Parsed cookies.
    pub cookies: BTreeMap<String, String>,
    /// Remote address, if known.
    pub ip: Option<IpAddr>,
    /// Authenticated user name, if any.
    pub username: Option<String>,
    /// CSRF token issued for this request.
    pub csrf_token: Option<String>,
    /// Timing context for observability.
    pub timing: TimingContext,
}

impl RequestContext {
    /// Create a new request context.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::generate(),
            method,
            url: url.into(),
            base_url: String::new(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            cookies: BTreeMap::new(),
            ip: None,
            username: None,
            csrf_token: None,
            timing: TimingContext::new(),
        }
    }

    /// Build a context from an `http::Request`, parsing its cookies.
    pub fn from_http<B>(request: &http::Request<B>) -> Self {
        let url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        let mut ctx = Self::new(request.method().clone(), url);
        ctx.version = request.version();
        ctx.headers = request.headers().clone();
        for value in request.headers().get_all(COOKIE) {
            if let Ok(raw) = value.to_str() {
                ctx.cookies.extend(parse_cookie_header(raw));
            }
        }
        ctx
    }

    /// Add a header. Names or values that are not valid HTTP are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::debug!(header = name, "skipping invalid request header"),
        }
        self
    }

    /// Add a cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Set the router mount point.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the remote address.
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Set the authenticated user name.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the CSRF token.
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Path portion of the URL (without the query string).
    pub fn path(&self) -> &str {
        self.url.split_once('?').map(|(p, _)| p).unwrap_or(&self.url)
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a cookie by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }

    /// The `Referer` header.
    pub fn referer(&self) -> Option<&str> {
        self.headers.get(REFERER).and_then(|v| v.to_str().ok())
    }

    /// The `User-Agent` header.
    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get(USER_AGENT).and_then(|v| v.to_str().ok())
    }
}

/// Parse a `Cookie` header into name/value pairs.
pub fn parse_cookie_header(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}

/// Render an HTTP version the way access logs print it (`1.1`, `2`).
pub fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}
