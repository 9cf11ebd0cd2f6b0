//! Session context shared by every request of one physical session.

use std::sync::Arc;

use duplex_analytics::{
    AnalyticsBridge, AnalyticsHandlers, AnalyticsReceiver, AnalyticsRouter, DeliverySink,
    LocalSink, NoopHandlers, RelaySink,
};
use duplex_cache::FetchCache;
use duplex_core::{BootstrapState, DuplexConfig, Environment, NavigationTracker, RequestContext};
use duplex_data::{ReqwestTransport, Transport};
use duplex_render::{
    Layout, LiveDocument, LiveRenderContract, RenderContract, RenderEngine,
    SerializingRenderContract,
};

use crate::error::DuplexError;
use crate::exchange::Exchange;

/// State that outlives a single request: the first-request flag and the
/// fetch cache, plus the environment's render and analytics wiring.
///
/// Nothing here is process-global; two sessions never share a flag or a
/// cache.
pub struct Session {
    pub(crate) environment: Environment,
    pub(crate) config: DuplexConfig,
    pub(crate) tracker: NavigationTracker,
    pub(crate) cache: Arc<FetchCache>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) renderer: Arc<dyn RenderContract>,
    pub(crate) bridge: AnalyticsBridge,
    pub(crate) handlers: Arc<dyn AnalyticsHandlers>,
    pub(crate) csrf_token: Option<String>,
}

impl Session {
    /// Start a request.
    pub fn exchange(&self, request: RequestContext) -> Exchange<'_> {
        Exchange::new(self, request)
    }

    /// Environment this session runs in.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Session configuration.
    pub fn config(&self) -> &DuplexConfig {
        &self.config
    }

    /// Whether the session's first response has not yet completed.
    ///
    /// This is session-wide: a second exchange started while the first is
    /// still running has already claimed `ClientNavigation` even though this
    /// returns true. Per-request decisions use
    /// [`Exchange::navigation`](crate::Exchange::navigation).
    pub fn first_response_pending(&self) -> bool {
        self.tracker.is_first_request()
    }

    /// The session's fetch cache.
    pub fn cache(&self) -> &Arc<FetchCache> {
        &self.cache
    }

    /// Endpoint handler for events relayed from client sessions.
    pub fn analytics_receiver(&self) -> AnalyticsReceiver {
        AnalyticsReceiver::new(self.handlers.clone())
            .with_session_cookie(self.config.session_cookie.clone())
    }
}

/// Builds a [`Session`].
pub struct SessionBuilder {
    environment: Environment,
    config: DuplexConfig,
    document: Option<Arc<dyn LiveDocument>>,
    transport: Option<Arc<dyn Transport>>,
    engine: Option<Arc<dyn RenderEngine>>,
    layout: Option<Arc<dyn Layout>>,
    sink: Option<Arc<dyn DeliverySink>>,
    router: Option<Arc<dyn AnalyticsRouter>>,
    handlers: Option<Arc<dyn AnalyticsHandlers>>,
    bootstrap: Option<BootstrapState>,
}

impl SessionBuilder {
    fn new(environment: Environment, config: DuplexConfig) -> Self {
        Self {
            environment,
            config,
            document: None,
            transport: None,
            engine: None,
            layout: None,
            sink: None,
            router: None,
            handlers: None,
            bootstrap: None,
        }
    }

    /// One-shot server session rendering a serialized document.
    pub fn server(config: DuplexConfig) -> Self {
        Self::new(Environment::Server, config)
    }

    /// Long-lived client session mounting into `document`.
    pub fn client(config: DuplexConfig, document: Arc<dyn LiveDocument>) -> Self {
        let mut builder = Self::new(Environment::Client, config);
        builder.document = Some(document);
        builder
    }

    /// Network transport for data fetches and analytics relays.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Rendering engine.
    pub fn with_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Default layout.
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Analytics sink, replacing the environment default.
    pub fn with_sink(mut self, sink: Arc<dyn DeliverySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Analytics router.
    pub fn with_router(mut self, router: Arc<dyn AnalyticsRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Application pageview/event handlers (server side).
    pub fn with_handlers(mut self, handlers: Arc<dyn AnalyticsHandlers>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Seed the session from a server bootstrap payload.
    pub fn with_bootstrap(mut self, bootstrap: BootstrapState) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    /// Seed the session from the JSON text of a bootstrap `<script>`.
    pub fn with_bootstrap_json(self, json: &str) -> Result<Self, DuplexError> {
        let bootstrap = BootstrapState::from_json(json)?;
        Ok(self.with_bootstrap(bootstrap))
    }

    /// Build the session.
    pub fn build(self) -> Session {
        let config = self.config;
        let transport: Arc<dyn Transport> = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let handlers: Arc<dyn AnalyticsHandlers> =
            self.handlers.unwrap_or_else(|| Arc::new(NoopHandlers));

        let cache = Arc::new(FetchCache::new());
        let mut csrf_token = None;
        let mut default_title = None;
        if let Some(bootstrap) = self.bootstrap {
            let seeded = cache.seed(bootstrap.query_cache);
            tracing::debug!(seeded, "Seeded fetch cache from bootstrap");
            csrf_token = bootstrap.csrf_token;
            default_title = bootstrap.default_title;
        }

        let renderer: Arc<dyn RenderContract> = match (self.environment, self.document) {
            (Environment::Client, Some(document)) => {
                let mut contract = LiveRenderContract::new(&config, document);
                if let Some(engine) = self.engine {
                    contract = contract.with_engine(engine);
                }
                if let Some(layout) = self.layout {
                    contract = contract.with_layout(layout);
                }
                if let Some(title) = default_title {
                    contract = contract.with_default_title(title);
                }
                Arc::new(contract)
            }
            _ => {
                let mut contract = SerializingRenderContract::new(&config);
                if let Some(engine) = self.engine {
                    contract = contract.with_engine(engine);
                }
                if let Some(layout) = self.layout {
                    contract = contract.with_layout(layout);
                }
                Arc::new(contract)
            }
        };

        let sink: Arc<dyn DeliverySink> = match (self.sink, self.environment) {
            (Some(sink), _) => sink,
            (None, Environment::Server) => Arc::new(LocalSink::new(handlers.clone())),
            (None, Environment::Client) => Arc::new(
                RelaySink::new(transport.clone(), config.analytics_endpoint.clone())
                    .with_session_cookie(config.session_cookie.clone()),
            ),
        };

        let mut bridge = AnalyticsBridge::new(self.environment, sink)
            .with_session_cookie(config.session_cookie.clone());
        if let Some(router) = self.router {
            bridge = bridge.with_router(router);
        }

        tracing::debug!(
            environment = %self.environment,
            app = %config.app_name,
            "Session started"
        );

        Session {
            environment: self.environment,
            config,
            tracker: NavigationTracker::new(),
            cache,
            transport,
            renderer,
            bridge,
            handlers,
            csrf_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplex_cache::RequestSignature;
    use duplex_render::HeadlessDocument;
    use serde_json::json;

    #[test]
    fn test_sessions_do_not_share_state() {
        let a = SessionBuilder::server(DuplexConfig::default()).build();
        let b = SessionBuilder::server(DuplexConfig::default()).build();

        drop(a.exchange(RequestContext::new(http::Method::GET, "/")));

        assert!(!a.first_response_pending());
        assert!(b.first_response_pending());
        assert!(!Arc::ptr_eq(a.cache(), b.cache()));
    }

    #[test]
    fn test_bootstrap_seeds_client_session() {
        let mut bootstrap = BootstrapState::new()
            .with_default_title("Seeded")
            .with_csrf_token("tok");
        bootstrap
            .query_cache
            .insert("/api/a-({})".into(), json!({"id": 1}));
        let json = bootstrap.to_script_json().unwrap();

        let session = SessionBuilder::client(DuplexConfig::default(), Arc::new(HeadlessDocument::new()))
            .with_bootstrap_json(&json)
            .unwrap()
            .build();

        assert_eq!(session.environment(), Environment::Client);
        assert!(session
            .cache()
            .contains(&RequestSignature::from_raw("/api/a-({})")));
        assert_eq!(session.csrf_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_invalid_bootstrap_json() {
        let result = SessionBuilder::client(DuplexConfig::default(), Arc::new(HeadlessDocument::new()))
            .with_bootstrap_json("{not json");
        assert!(matches!(result, Err(DuplexError::Bootstrap(_))));
    }
}
