//! Server endpoint for events relayed from client sessions.

use std::net::IpAddr;
use std::sync::Arc;

use duplex_core::{version_label, RequestContext};
use http::{header, StatusCode};
use serde_json::{json, Value};

use crate::common_log::AccessRecord;
use crate::event::{AnalyticsKind, WireEvent};
use crate::sink::{dispatch_hit, AnalyticsHandlers, AnalyticsHit, OVERRIDE_REFERER};

/// Errors raised while accepting a relayed event.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("Invalid analytics body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Analytics body is not a JSON object")]
    NotAnObject,
}

/// What the receiver did with one relayed event.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    /// Recognised kind, if the `type` field named one.
    pub kind: Option<AnalyticsKind>,
    /// The common-log line written.
    pub access_line: String,
    /// Hit handed to the handlers.
    pub hit: AnalyticsHit,
}

/// Accepts `POST`s from [`RelaySink`](crate::RelaySink).
pub struct AnalyticsReceiver {
    handlers: Arc<dyn AnalyticsHandlers>,
    session_cookie: String,
}

impl AnalyticsReceiver {
    /// Create a receiver that dispatches to `handlers`.
    pub fn new(handlers: Arc<dyn AnalyticsHandlers>) -> Self {
        Self {
            handlers,
            session_cookie: "sessionId".to_string(),
        }
    }

    /// Name of the cookie carrying the session id.
    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    /// Handle a raw HTTP request.
    pub fn handle<B: AsRef<[u8]>>(
        &self,
        request: &http::Request<B>,
        ip: Option<IpAddr>,
    ) -> http::Response<Vec<u8>> {
        let mut context = RequestContext::from_http(request);
        context.ip = ip;
        self.respond(&context, request.body().as_ref())
    }

    /// Handle a request already parsed into a context.
    pub fn respond(&self, request: &RequestContext, body: &[u8]) -> http::Response<Vec<u8>> {
        match self.handle_event(request, body) {
            Ok(_) => json_response(StatusCode::OK, true),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected analytics relay");
                json_response(StatusCode::BAD_REQUEST, false)
            }
        }
    }

    /// Log and dispatch one relayed event.
    pub fn handle_event(
        &self,
        request: &RequestContext,
        body: &[u8],
    ) -> Result<Receipt, ReceiveError> {
        let wire = match serde_json::from_slice(body)? {
            Value::Object(map) => WireEvent::from_object(map),
            _ => return Err(ReceiveError::NotAnObject),
        };

        // The relay call's own Referer is the client page making the call,
        // never the page the event describes.
        let referer = request.header(OVERRIDE_REFERER).map(str::to_string);
        let session_id = request.cookie(&self.session_cookie).map(str::to_string);

        let record = AccessRecord {
            ip: request.ip,
            session_id: session_id.clone(),
            username: request.username.clone(),
            method: wire.method.clone(),
            url: wire.url.clone(),
            http_version: version_label(request.version).to_string(),
            status_code: wire.status_code,
            referer: referer.clone(),
            user_agent: request.user_agent().map(str::to_string),
        };
        let access_line = record.log();

        let kind = AnalyticsKind::parse(&wire.kind);
        let hit = AnalyticsHit {
            url: wire.url,
            referer,
            user_agent: record.user_agent,
            ip: request.ip,
            session_id,
            params: wire.params,
        };

        if let Err(e) = dispatch_hit(self.handlers.as_ref(), kind, &hit) {
            tracing::warn!(kind = %wire.kind, error = %e, "Analytics handler failed");
        }

        Ok(Receipt {
            kind,
            access_line,
            hit,
        })
    }
}

fn json_response(status: StatusCode, success: bool) -> http::Response<Vec<u8>> {
    let mut response = http::Response::new(json!({ "success": success }).to_string().into_bytes());
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use http::Method;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(&'static str, AnalyticsHit)>>,
    }

    impl AnalyticsHandlers for Recording {
        fn pageview(&self, hit: &AnalyticsHit) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(("pageview", hit.clone()));
            Ok(())
        }

        fn event(&self, hit: &AnalyticsHit) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(("event", hit.clone()));
            Ok(())
        }
    }

    fn relay(body: &str) -> http::Request<Vec<u8>> {
        http::Request::builder()
            .method(Method::POST)
            .uri("/analytics")
            .header("content-type", "application/json")
            .header("referer", "https://shop.test/cart")
            .header("override-referer", "https://shop.test/products")
            .header("user-agent", "shop-agent/1.0")
            .header("cookie", "sessionId=s-1; theme=dark")
            .body(body.as_bytes().to_vec())
            .unwrap()
    }

    fn body_json(response: &http::Response<Vec<u8>>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    // === Dispatch ===

    #[test]
    fn test_pageview_dispatched_with_restored_referer() {
        let handlers = Arc::new(Recording::default());
        let receiver = AnalyticsReceiver::new(handlers.clone());

        let response = receiver.handle(
            &relay(r#"{"type":"pageview","url":"/cart","statusCode":200,"method":"GET","ref":"mail"}"#),
            Some("10.0.0.7".parse().unwrap()),
        );

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(&response), json!({"success": true}));
        let calls = handlers.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (name, hit) = &calls[0];
        assert_eq!(*name, "pageview");
        assert_eq!(hit.referer.as_deref(), Some("https://shop.test/products"));
        assert_eq!(hit.session_id.as_deref(), Some("s-1"));
        assert_eq!(hit.params["ref"], json!("mail"));
    }

    #[test]
    fn test_unknown_type_logs_without_action() {
        let handlers = Arc::new(Recording::default());
        let receiver = AnalyticsReceiver::new(handlers.clone());
        let request = RequestContext::new(Method::POST, "/analytics")
            .with_header("override-referer", "https://shop.test/")
            .with_cookie("sessionId", "s-2");

        let receipt = receiver
            .handle_event(
                &request,
                br#"{"type":"bogus","url":"/x","statusCode":200,"method":"GET"}"#,
            )
            .unwrap();

        assert_eq!(receipt.kind, None);
        assert!(receipt.access_line.contains("\"GET /x HTTP/1.1\" 200 - \"https://shop.test/\""));
        assert!(handlers.calls.lock().unwrap().is_empty());

        let response = receiver.respond(&request, br#"{"type":"bogus"}"#);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(&response), json!({"success": true}));
    }

    #[test]
    fn test_log_type_takes_no_action() {
        let handlers = Arc::new(Recording::default());
        let receiver = AnalyticsReceiver::new(handlers.clone());

        let response = receiver.handle(&relay(r#"{"type":"log","url":"/","statusCode":200}"#), None);

        assert_eq!(response.status(), StatusCode::OK);
        assert!(handlers.calls.lock().unwrap().is_empty());
    }

    // === Access line ===

    #[test]
    fn test_access_line_fields() {
        let receiver = AnalyticsReceiver::new(Arc::new(crate::NoopHandlers));
        let request = RequestContext::new(Method::POST, "/analytics")
            .with_ip("10.0.0.7".parse().unwrap())
            .with_username("ada")
            .with_cookie("sessionId", "s-3")
            .with_header("override-referer", "https://shop.test/relay-page")
            .with_header("user-agent", "shop-agent/1.0");

        let receipt = receiver
            .handle_event(
                &request,
                br#"{"type":"event","url":"/checkout","statusCode":302,"method":"post"}"#,
            )
            .unwrap();

        assert!(receipt.access_line.starts_with("10.0.0.7 s-3 ada ["));
        assert!(receipt.access_line.ends_with(
            "\"POST /checkout HTTP/1.1\" 302 - \"https://shop.test/relay-page\" \"shop-agent/1.0\""
        ));
    }

    #[test]
    fn test_missing_override_referer_logs_dash() {
        let handlers = Arc::new(Recording::default());
        let receiver = AnalyticsReceiver::new(handlers.clone());
        let request = RequestContext::new(Method::POST, "/analytics")
            .with_header("referer", "https://shop.test/current-client-page");

        let receipt = receiver
            .handle_event(
                &request,
                br#"{"type":"pageview","url":"/x","statusCode":200,"method":"GET"}"#,
            )
            .unwrap();

        assert!(receipt.access_line.ends_with("\"GET /x HTTP/1.1\" 200 - \"-\" \"-\""));
        assert_eq!(receipt.hit.referer, None);
        assert_eq!(handlers.calls.lock().unwrap()[0].1.referer, None);
    }

    // === Malformed fields ===

    #[test]
    fn test_non_string_type_is_logged_and_accepted() {
        let handlers = Arc::new(Recording::default());
        let receiver = AnalyticsReceiver::new(handlers.clone());
        let request = RequestContext::new(Method::POST, "/analytics")
            .with_header("override-referer", "https://shop.test/");

        let receipt = receiver
            .handle_event(
                &request,
                br#"{"type":5,"url":"/x","statusCode":200,"method":"GET"}"#,
            )
            .unwrap();
        assert_eq!(receipt.kind, None);
        assert!(receipt.access_line.contains("\"GET /x HTTP/1.1\" 200 - \"https://shop.test/\""));
        assert!(handlers.calls.lock().unwrap().is_empty());

        for body in [
            &br#"{"type":5,"url":"/x","statusCode":200,"method":"GET"}"#[..],
            br#"{"type":null,"url":"/x"}"#,
            br#"{"type":{"k":1},"url":"/x"}"#,
            br#"{"type":"pageview","url":"/x","statusCode":"oops"}"#,
        ] {
            let response = receiver.respond(&request, body);
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(&response), json!({"success": true}));
        }
    }

    // === Rejections ===

    #[test]
    fn test_non_json_body_rejected() {
        let receiver = AnalyticsReceiver::new(Arc::new(crate::NoopHandlers));

        let response = receiver.handle(&relay("not json"), None);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response), json!({"success": false}));
    }

    #[test]
    fn test_non_object_body_rejected() {
        let receiver = AnalyticsReceiver::new(Arc::new(crate::NoopHandlers));

        for body in ["5", "[]", "\"pageview\"", "null"] {
            let response = receiver.handle(&relay(body), None);
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert!(matches!(
            receiver.handle_event(&RequestContext::new(Method::POST, "/analytics"), b"[]"),
            Err(ReceiveError::NotAnObject)
        ));
    }

    #[test]
    fn test_handler_failure_still_succeeds() {
        struct Failing;
        impl AnalyticsHandlers for Failing {
            fn event(&self, _hit: &AnalyticsHit) -> anyhow::Result<()> {
                anyhow::bail!("down")
            }
        }
        let receiver = AnalyticsReceiver::new(Arc::new(Failing));

        let response = receiver.handle(&relay(r#"{"type":"event","url":"/"}"#), None);

        assert_eq!(response.status(), StatusCode::OK);
    }
}
