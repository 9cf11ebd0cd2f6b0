//! Analytics event types.

use std::net::IpAddr;

use duplex_core::{version_label, RequestContext, ResponseState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of analytics event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsKind {
    /// Explicit page view.
    Pageview,
    /// Explicit custom event.
    Event,
    /// Passive completion log.
    Log,
}

impl AnalyticsKind {
    /// Parse a wire `type` value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pageview" => Some(Self::Pageview),
            "event" => Some(Self::Event),
            "log" => Some(Self::Log),
            _ => None,
        }
    }

    /// Get the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pageview => "pageview",
            Self::Event => "event",
            Self::Log => "log",
        }
    }
}

impl std::fmt::Display for AnalyticsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who made the request an event describes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOrigin {
    /// Remote address.
    pub ip: Option<IpAddr>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// HTTP version label (`1.1`).
    pub http_version: String,
    /// Authenticated user name.
    pub username: Option<String>,
    /// CSRF token to present when relaying.
    pub csrf_token: Option<String>,
}

/// One analytics event, built when a response completes and handed
/// straight to a delivery sink.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    /// Event kind.
    pub kind: AnalyticsKind,
    /// Original request URL.
    pub url: String,
    /// Request method.
    pub method: String,
    /// Final response status.
    pub status_code: u16,
    /// Referer of the page that made the request.
    pub referer: Option<String>,
    /// Session identifier for correlation.
    pub session_id: Option<String>,
    /// Extra parameters supplied by the caller.
    pub params: Map<String, Value>,
    /// Request origin details.
    pub origin: RequestOrigin,
}

impl AnalyticsEvent {
    /// Build an event from a completed exchange.
    pub fn from_exchange(
        kind: AnalyticsKind,
        request: &RequestContext,
        response: &ResponseState,
        session_cookie: &str,
        params: Map<String, Value>,
    ) -> Self {
        Self {
            kind,
            url: request.url.clone(),
            method: request.method.as_str().to_ascii_uppercase(),
            status_code: response.status().as_u16(),
            referer: request.referer().map(str::to_string),
            session_id: request.cookie(session_cookie).map(str::to_string),
            params,
            origin: RequestOrigin {
                ip: request.ip,
                user_agent: request.user_agent().map(str::to_string),
                http_version: version_label(request.version).to_string(),
                username: request.username.clone(),
                csrf_token: request.csrf_token.clone(),
            },
        }
    }

    /// The JSON body relayed to the analytics endpoint.
    pub fn to_wire(&self) -> WireEvent {
        WireEvent {
            kind: self.kind.as_str().to_string(),
            url: Some(self.url.clone()),
            status_code: Some(self.status_code),
            method: Some(self.method.clone()),
            params: self.params.clone(),
        }
    }
}

/// Wire body of a relayed event: `{type, url, statusCode, method, ...params}`.
///
/// `type` stays a string so the endpoint can accept kinds it does not know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    /// Event kind as sent.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Original request URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Final response status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Request method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Everything else.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl WireEvent {
    /// Read a relayed body field by field.
    ///
    /// Fields of the wrong JSON type are treated as absent; everything that
    /// is not a known field stays in `params`. A non-string `type` becomes an
    /// empty kind, which names no known kind.
    pub fn from_object(mut body: Map<String, Value>) -> Self {
        let kind = match body.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => String::new(),
        };
        let url = string_field(body.remove("url"));
        let method = string_field(body.remove("method"));
        let status_code = match body.remove("statusCode") {
            Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };

        Self {
            kind,
            url,
            status_code,
            method,
            params: body,
        }
    }
}

fn string_field(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
