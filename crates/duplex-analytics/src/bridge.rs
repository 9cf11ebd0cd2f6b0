//! Completion-triggered analytics with first-load suppression.

use std::sync::Arc;

use duplex_core::{Environment, NavigationKind, RequestContext, ResponseState};
use serde_json::{Map, Value};

use crate::common_log::AccessRecord;
use crate::event::{AnalyticsEvent, AnalyticsKind};
use crate::sink::DeliverySink;

/// Result of running the analytics router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// The router took care of this completion; no implicit log.
    Handled,
    /// Fall through to the implicit log event.
    Next,
}

/// Collects explicit analytics calls made by a router.
#[derive(Debug, Default)]
pub struct Emitter {
    calls: Vec<(AnalyticsKind, Map<String, Value>)>,
}

impl Emitter {
    /// Record a page view.
    pub fn pageview(&mut self, params: Map<String, Value>) {
        self.calls.push((AnalyticsKind::Pageview, params));
    }

    /// Record a custom event.
    pub fn event(&mut self, params: Map<String, Value>) {
        self.calls.push((AnalyticsKind::Event, params));
    }

    /// Number of calls recorded so far.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if no calls were recorded.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Application hook run once per completed response.
pub trait AnalyticsRouter: Send + Sync {
    /// Emit any explicit events and decide whether the implicit log follows.
    fn route(
        &self,
        request: &RequestContext,
        response: &ResponseState,
        emit: &mut Emitter,
    ) -> Routed;
}

/// Router that never emits and always falls through.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRouter;

impl AnalyticsRouter for DefaultRouter {
    fn route(&self, _: &RequestContext, _: &ResponseState, _: &mut Emitter) -> Routed {
        Routed::Next
    }
}

/// What happened to the implicit log for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDisposition {
    /// Dispatched to the sink.
    Emitted,
    /// Dropped because the other environment already logged this load.
    Suppressed,
    /// The router handled the completion.
    HandledByRouter,
}

/// Summary of one `on_complete` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionReport {
    /// Explicit pageview/event calls dispatched.
    pub explicit: usize,
    /// Fate of the implicit log.
    pub log: LogDisposition,
    /// Whether an access line was written for this completion.
    pub access_logged: bool,
}

/// Fires analytics when a response completes.
///
/// In a server session every completion writes exactly one access line,
/// before the router runs and whatever it decides. Client completions are
/// logged by the endpoint their relayed `log` event reaches. Delivery runs on a detached task; the caller never waits for it and
/// never sees its errors.
pub struct AnalyticsBridge {
    environment: Environment,
    sink: Arc<dyn DeliverySink>,
    router: Arc<dyn AnalyticsRouter>,
    session_cookie: String,
}

impl AnalyticsBridge {
    /// Create a bridge with the default router.
    pub fn new(environment: Environment, sink: Arc<dyn DeliverySink>) -> Self {
        Self {
            environment,
            sink,
            router: Arc::new(DefaultRouter),
            session_cookie: "sessionId".to_string(),
        }
    }

    /// Install an application router.
    pub fn with_router(mut self, router: Arc<dyn AnalyticsRouter>) -> Self {
        self.router = router;
        self
    }

    /// Name of the cookie carrying the session id.
    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    /// Environment this bridge runs in.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Run the router and dispatch events for a completed exchange.
    ///
    /// Returns `None` while the response is still open.
    pub fn on_complete(
        &self,
        navigation: NavigationKind,
        request: &RequestContext,
        response: &ResponseState,
    ) -> Option<CompletionReport> {
        if !response.is_finalized() {
            tracing::debug!(
                url = %request.url,
                "Response still open, skipping completion analytics"
            );
            return None;
        }

        let access_logged = self.environment == Environment::Server;
        if access_logged {
            let completion = self.event(AnalyticsKind::Log, request, response, Map::new());
            AccessRecord::from_event(&completion).log();
        }

        let mut emitter = Emitter::default();
        let routed = self.router.route(request, response, &mut emitter);

        let explicit = emitter.calls.len();
        for (kind, params) in emitter.calls {
            self.dispatch(self.event(kind, request, response, params));
        }

        let log = match routed {
            Routed::Handled => LogDisposition::HandledByRouter,
            Routed::Next
                if self.environment.suppresses_first_load_log() && navigation.is_first() =>
            {
                tracing::debug!(url = %request.url, "Suppressing first-load log");
                LogDisposition::Suppressed
            }
            Routed::Next => {
                self.dispatch(self.event(AnalyticsKind::Log, request, response, Map::new()));
                LogDisposition::Emitted
            }
        };

        Some(CompletionReport {
            explicit,
            log,
            access_logged,
        })
    }

    fn event(
        &self,
        kind: AnalyticsKind,
        request: &RequestContext,
        response: &ResponseState,
        params: Map<String, Value>,
    ) -> AnalyticsEvent {
        AnalyticsEvent::from_exchange(kind, request, response, &self.session_cookie, params)
    }

    fn dispatch(&self, event: AnalyticsEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                kind = %event.kind,
                url = %event.url,
                "No async runtime, dropping analytics event"
            );
            return;
        };

        let sink = self.sink.clone();
        handle.spawn(async move {
            let kind = event.kind;
            let url = event.url.clone();
            if let Err(e) = sink.deliver(event).await {
                tracing::warn!(kind = %kind, url = %url, error = %e, "Analytics delivery failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use http::{Method, StatusCode};
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::sink::DeliveryError;

    struct ChannelSink(mpsc::UnboundedSender<AnalyticsEvent>);

    #[async_trait]
    impl DeliverySink for ChannelSink {
        async fn deliver(&self, event: AnalyticsEvent) -> Result<(), DeliveryError> {
            let _ = self.0.send(event);
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl DeliverySink for BrokenSink {
        async fn deliver(&self, _event: AnalyticsEvent) -> Result<(), DeliveryError> {
            Err(DeliveryError::Rejected(503))
        }
    }

    struct ProductRouter;

    impl AnalyticsRouter for ProductRouter {
        fn route(
            &self,
            request: &RequestContext,
            _response: &ResponseState,
            emit: &mut Emitter,
        ) -> Routed {
            if request.path().starts_with("/products") {
                let mut params = Map::new();
                params.insert("section".into(), json!("catalog"));
                emit.pageview(params);
                return Routed::Handled;
            }
            if request.path() == "/cart" {
                emit.event(Map::new());
            }
            Routed::Next
        }
    }

    fn bridge(environment: Environment) -> (AnalyticsBridge, mpsc::UnboundedReceiver<AnalyticsEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (AnalyticsBridge::new(environment, Arc::new(ChannelSink(tx))), rx)
    }

    fn finished(status: StatusCode) -> ResponseState {
        let mut response = ResponseState::new();
        response.finalize(status).unwrap();
        response
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<AnalyticsEvent>) -> AnalyticsEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    // === Completion ordering ===

    #[tokio::test]
    async fn test_open_response_emits_nothing() {
        let (bridge, _rx) = bridge(Environment::Client);
        let request = RequestContext::new(Method::GET, "/a");

        let report = bridge.on_complete(
            NavigationKind::ClientNavigation,
            &request,
            &ResponseState::new(),
        );

        assert_eq!(report, None);
    }

    #[tokio::test]
    async fn test_log_carries_final_status() {
        let (bridge, mut rx) = bridge(Environment::Client);
        let request = RequestContext::new(Method::GET, "/missing").with_cookie("sessionId", "s-9");

        bridge.on_complete(
            NavigationKind::ClientNavigation,
            &request,
            &finished(StatusCode::NOT_FOUND),
        );

        let event = next_event(&mut rx).await;
        assert_eq!(event.kind, AnalyticsKind::Log);
        assert_eq!(event.status_code, 404);
        assert_eq!(event.session_id.as_deref(), Some("s-9"));
    }

    // === Suppression ===

    #[tokio::test]
    async fn test_client_first_load_log_suppressed_once() {
        let (bridge, mut rx) = bridge(Environment::Client);
        let first = RequestContext::new(Method::GET, "/first");
        let second = RequestContext::new(Method::GET, "/second");
        let ok = finished(StatusCode::OK);

        let report = bridge
            .on_complete(NavigationKind::FirstLoad, &first, &ok)
            .unwrap();
        assert_eq!(report.log, LogDisposition::Suppressed);

        let report = bridge
            .on_complete(NavigationKind::ClientNavigation, &second, &ok)
            .unwrap();
        assert_eq!(report.log, LogDisposition::Emitted);

        // The suppressed log was never queued, so the first delivery is /second.
        let event = next_event(&mut rx).await;
        assert_eq!(event.url, "/second");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_server_first_load_logs() {
        let (bridge, mut rx) = bridge(Environment::Server);
        let request = RequestContext::new(Method::GET, "/");

        let report = bridge
            .on_complete(NavigationKind::FirstLoad, &request, &finished(StatusCode::OK))
            .unwrap();

        assert_eq!(report.log, LogDisposition::Emitted);
        assert_eq!(next_event(&mut rx).await.kind, AnalyticsKind::Log);
    }

    #[tokio::test]
    async fn test_explicit_events_never_suppressed() {
        let (bridge, mut rx) = bridge(Environment::Client);
        let bridge = bridge.with_router(Arc::new(ProductRouter));
        let request = RequestContext::new(Method::GET, "/cart");

        let report = bridge
            .on_complete(NavigationKind::FirstLoad, &request, &finished(StatusCode::OK))
            .unwrap();

        assert_eq!(
            report,
            CompletionReport {
                explicit: 1,
                log: LogDisposition::Suppressed,
                access_logged: false,
            }
        );
        assert_eq!(next_event(&mut rx).await.kind, AnalyticsKind::Event);
        assert!(rx.try_recv().is_err());
    }

    // === Router ===

    #[tokio::test]
    async fn test_router_handled_skips_log() {
        let (bridge, mut rx) = bridge(Environment::Client);
        let bridge = bridge.with_router(Arc::new(ProductRouter));
        let request = RequestContext::new(Method::GET, "/products/7");

        let report = bridge
            .on_complete(
                NavigationKind::ClientNavigation,
                &request,
                &finished(StatusCode::OK),
            )
            .unwrap();

        assert_eq!(report.log, LogDisposition::HandledByRouter);
        let event = next_event(&mut rx).await;
        assert_eq!(event.kind, AnalyticsKind::Pageview);
        assert_eq!(event.params["section"], json!("catalog"));
        assert!(rx.try_recv().is_err());
    }

    // === Server access log ===

    struct HandledSilently;

    impl AnalyticsRouter for HandledSilently {
        fn route(&self, _: &RequestContext, _: &ResponseState, _: &mut Emitter) -> Routed {
            Routed::Handled
        }
    }

    struct PageviewThenNext;

    impl AnalyticsRouter for PageviewThenNext {
        fn route(&self, _: &RequestContext, _: &ResponseState, emit: &mut Emitter) -> Routed {
            emit.pageview(Map::new());
            Routed::Next
        }
    }

    #[tokio::test]
    async fn test_server_access_line_once_per_completion() {
        let request = RequestContext::new(Method::GET, "/products");
        let ok = finished(StatusCode::OK);
        let routers: [Arc<dyn AnalyticsRouter>; 4] = [
            Arc::new(DefaultRouter),
            Arc::new(HandledSilently),
            Arc::new(PageviewThenNext),
            Arc::new(ProductRouter),
        ];

        for router in routers {
            let (bridge, _rx) = bridge(Environment::Server);
            let bridge = bridge.with_router(router);
            let report = bridge
                .on_complete(NavigationKind::ClientNavigation, &request, &ok)
                .unwrap();
            assert!(report.access_logged);
        }
    }

    #[tokio::test]
    async fn test_server_local_sink_only_dispatches() {
        use crate::sink::{AnalyticsHandlers, AnalyticsHit, LocalSink};
        use std::sync::Mutex;

        #[derive(Default)]
        struct Counting {
            pageviews: Mutex<usize>,
        }

        impl AnalyticsHandlers for Counting {
            fn pageview(&self, _hit: &AnalyticsHit) -> anyhow::Result<()> {
                *self.pageviews.lock().unwrap() += 1;
                Ok(())
            }
        }

        let handlers = Arc::new(Counting::default());
        let bridge = AnalyticsBridge::new(
            Environment::Server,
            Arc::new(LocalSink::new(handlers.clone())),
        )
        .with_router(Arc::new(PageviewThenNext));
        let request = RequestContext::new(Method::GET, "/");

        let report = bridge
            .on_complete(NavigationKind::FirstLoad, &request, &finished(StatusCode::OK))
            .unwrap();

        assert_eq!(
            report,
            CompletionReport {
                explicit: 1,
                log: LogDisposition::Emitted,
                access_logged: true,
            }
        );
        for _ in 0..100 {
            if *handlers.pageviews.lock().unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*handlers.pageviews.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_client_completion_writes_no_access_line() {
        let (bridge, _rx) = bridge(Environment::Client);
        let request = RequestContext::new(Method::GET, "/a");

        let report = bridge
            .on_complete(
                NavigationKind::ClientNavigation,
                &request,
                &finished(StatusCode::OK),
            )
            .unwrap();

        assert!(!report.access_logged);
    }

    // === Delivery failures ===

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let bridge = AnalyticsBridge::new(Environment::Server, Arc::new(BrokenSink));
        let request = RequestContext::new(Method::GET, "/");

        let report = bridge.on_complete(
            NavigationKind::FirstLoad,
            &request,
            &finished(StatusCode::OK),
        );

        assert_eq!(report.map(|r| r.log), Some(LogDisposition::Emitted));
        tokio::task::yield_now().await;
    }

    #[test]
    fn test_no_runtime_drops_event() {
        let (bridge, mut rx) = bridge(Environment::Server);
        let request = RequestContext::new(Method::GET, "/");

        let report = bridge.on_complete(
            NavigationKind::FirstLoad,
            &request,
            &finished(StatusCode::OK),
        );

        assert!(report.is_some());
        assert!(rx.try_recv().is_err());
    }
}
