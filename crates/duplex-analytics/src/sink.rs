//! Delivery sinks and application analytics handlers.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use duplex_data::{Transport, TransportRequest};
use http::Method;
use serde_json::{Map, Value};

use crate::event::{AnalyticsEvent, AnalyticsKind};

/// Header carrying the referer of the page that triggered a relayed event.
pub const OVERRIDE_REFERER: &str = "override-referer";

/// Header carrying the session's CSRF token on relays.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Delivery failures. Logged by the bridge, never surfaced to a response.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Endpoint rejected event with status {0}")]
    Rejected(u16),

    #[error("Handler failed: {0}")]
    Handler(#[from] anyhow::Error),
}

/// Where analytics events are delivered.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver one event.
    async fn deliver(&self, event: AnalyticsEvent) -> Result<(), DeliveryError>;
}

/// What the application's pageview/event handlers receive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsHit {
    /// URL of the page the hit belongs to.
    pub url: Option<String>,
    /// Referer of that page.
    pub referer: Option<String>,
    /// `User-Agent` of the browser.
    pub user_agent: Option<String>,
    /// Remote address.
    pub ip: Option<IpAddr>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Caller-supplied parameters.
    pub params: Map<String, Value>,
}

/// Application hooks for explicit analytics.
pub trait AnalyticsHandlers: Send + Sync {
    /// A page view was recorded.
    fn pageview(&self, _hit: &AnalyticsHit) -> anyhow::Result<()> {
        Ok(())
    }

    /// A custom event was recorded.
    fn event(&self, _hit: &AnalyticsHit) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Handlers that ignore everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandlers;

impl AnalyticsHandlers for NoopHandlers {}

/// Route a hit to the handler for `kind`. Logs and unknown kinds do nothing.
pub fn dispatch_hit(
    handlers: &dyn AnalyticsHandlers,
    kind: Option<AnalyticsKind>,
    hit: &AnalyticsHit,
) -> anyhow::Result<()> {
    match kind {
        Some(AnalyticsKind::Pageview) => handlers.pageview(hit),
        Some(AnalyticsKind::Event) => handlers.event(hit),
        Some(AnalyticsKind::Log) | None => Ok(()),
    }
}

/// Server-side sink: calls the handlers in-process.
///
/// The access line for a server completion is written by the bridge, so
/// delivering here never adds another one.
pub struct LocalSink {
    handlers: Arc<dyn AnalyticsHandlers>,
}

impl LocalSink {
    /// Create a sink around the application's handlers.
    pub fn new(handlers: Arc<dyn AnalyticsHandlers>) -> Self {
        Self { handlers }
    }
}

#[async_trait]
impl DeliverySink for LocalSink {
    async fn deliver(&self, event: AnalyticsEvent) -> Result<(), DeliveryError> {
        let hit = AnalyticsHit {
            url: Some(event.url),
            referer: event.referer,
            user_agent: event.origin.user_agent,
            ip: event.origin.ip,
            session_id: event.session_id,
            params: event.params,
        };
        dispatch_hit(self.handlers.as_ref(), Some(event.kind), &hit)?;
        Ok(())
    }
}

/// Client-side sink: POSTs events to the server's analytics endpoint.
pub struct RelaySink {
    transport: Arc<dyn Transport>,
    endpoint: String,
    session_cookie: String,
}

impl RelaySink {
    /// Create a relay to `endpoint`.
    pub fn new(transport: Arc<dyn Transport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            session_cookie: "sessionId".to_string(),
        }
    }

    /// Name of the cookie the session id travels in.
    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    /// Build the relay request for an event.
    pub fn request_for(&self, event: &AnalyticsEvent) -> Result<TransportRequest, DeliveryError> {
        let body = serde_json::to_vec(&event.to_wire())
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("accept".to_string(), "application/json".to_string());
        if let Some(token) = &event.origin.csrf_token {
            headers.insert(CSRF_HEADER.to_string(), token.clone());
        }
        if let Some(referer) = &event.referer {
            headers.insert(OVERRIDE_REFERER.to_string(), referer.clone());
        }
        if let Some(session_id) = &event.session_id {
            headers.insert(
                "cookie".to_string(),
                format!("{}={}", self.session_cookie, session_id),
            );
        }
        if let Some(user_agent) = &event.origin.user_agent {
            headers.insert("user-agent".to_string(), user_agent.clone());
        }

        Ok(TransportRequest {
            method: Method::POST,
            url: self.endpoint.clone(),
            headers,
            body: Some(body),
        })
    }
}

#[async_trait]
impl DeliverySink for RelaySink {
    async fn deliver(&self, event: AnalyticsEvent) -> Result<(), DeliveryError> {
        let request = self.request_for(&event)?;
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(DeliveryError::Rejected(response.status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use duplex_data::{TransportError, TransportResponse};
    use serde_json::json;

    fn event(kind: AnalyticsKind) -> AnalyticsEvent {
        AnalyticsEvent {
            kind,
            url: "/products".into(),
            method: "GET".into(),
            status_code: 200,
            referer: Some("https://shop.test/".into()),
            session_id: Some("s-1".into()),
            params: Map::new(),
            origin: Default::default(),
        }
    }

    #[derive(Default)]
    struct Recording {
        pageviews: Mutex<Vec<AnalyticsHit>>,
        events: Mutex<Vec<AnalyticsHit>>,
    }

    impl AnalyticsHandlers for Recording {
        fn pageview(&self, hit: &AnalyticsHit) -> anyhow::Result<()> {
            self.pageviews.lock().unwrap().push(hit.clone());
            Ok(())
        }

        fn event(&self, hit: &AnalyticsHit) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(hit.clone());
            Ok(())
        }
    }

    struct Failing;

    impl AnalyticsHandlers for Failing {
        fn pageview(&self, _hit: &AnalyticsHit) -> anyhow::Result<()> {
            anyhow::bail!("warehouse offline")
        }
    }

    struct FixedTransport {
        status: u16,
        seen: Mutex<Vec<TransportRequest>>,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(TransportResponse::new(
                self.status,
                HashMap::new(),
                br#"{"success":true}"#.to_vec(),
            ))
        }
    }

    #[tokio::test]
    async fn test_local_sink_dispatches_by_kind() {
        let handlers = Arc::new(Recording::default());
        let sink = LocalSink::new(handlers.clone());

        sink.deliver(event(AnalyticsKind::Pageview)).await.unwrap();
        sink.deliver(event(AnalyticsKind::Event)).await.unwrap();
        sink.deliver(event(AnalyticsKind::Log)).await.unwrap();

        assert_eq!(handlers.pageviews.lock().unwrap().len(), 1);
        assert_eq!(handlers.events.lock().unwrap().len(), 1);
        let hit = handlers.pageviews.lock().unwrap()[0].clone();
        assert_eq!(hit.url.as_deref(), Some("/products"));
        assert_eq!(hit.referer.as_deref(), Some("https://shop.test/"));
    }

    #[tokio::test]
    async fn test_local_sink_handler_failure() {
        let sink = LocalSink::new(Arc::new(Failing));
        let err = sink.deliver(event(AnalyticsKind::Pageview)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Handler(_)));
    }

    #[test]
    fn test_relay_request_shape() {
        let transport = Arc::new(FixedTransport {
            status: 200,
            seen: Mutex::new(Vec::new()),
        });
        let sink = RelaySink::new(transport, "/analytics");
        let mut ev = event(AnalyticsKind::Pageview);
        ev.origin.csrf_token = Some("tok".into());
        ev.params.insert("campaign".into(), json!("spring"));

        let request = sink.request_for(&ev).unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "/analytics");
        assert_eq!(request.headers[CSRF_HEADER], "tok");
        assert_eq!(request.headers[OVERRIDE_REFERER], "https://shop.test/");
        assert_eq!(request.headers["cookie"], "sessionId=s-1");
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "type": "pageview",
                "url": "/products",
                "statusCode": 200,
                "method": "GET",
                "campaign": "spring"
            })
        );
    }

    #[tokio::test]
    async fn test_relay_rejected_status() {
        let transport = Arc::new(FixedTransport {
            status: 403,
            seen: Mutex::new(Vec::new()),
        });
        let sink = RelaySink::new(transport.clone(), "/analytics");

        let err = sink.deliver(event(AnalyticsKind::Log)).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Rejected(403)));
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }
}
