//! Request scope: one navigation inside a session.

use std::sync::Arc;
use std::time::Duration;

use duplex_analytics::CompletionReport;
use duplex_core::{BootstrapState, Environment, NavigationKind, RequestContext, ResponseState};
use duplex_data::{CacheOptions, DataClient, FetchError, FetchOptions, HydrationRecorder};
use duplex_render::{RenderOptions, RenderOutcome, RenderScope, ViewHelpers};
use serde_json::Value;
use url::form_urlencoded;

use crate::error::DuplexError;
use crate::session::Session;

/// Append form-urlencoded `query` pairs to `path`.
pub fn location_with_query(path: &str, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query)
        .finish();
    format!("{}?{}", path, encoded)
}

/// One request/response pair inside a [`Session`].
///
/// The navigation kind is claimed when the exchange starts and every
/// decision of this request (cache policy, log suppression) uses it.
/// [`finish`](Self::finish) fires completion analytics and settles the
/// session's first-request flag; dropping an unfinished exchange settles
/// the flag without analytics.
pub struct Exchange<'s> {
    session: &'s Session,
    navigation: NavigationKind,
    request: RequestContext,
    response: ResponseState,
    data: DataClient,
    recorder: Option<Arc<HydrationRecorder>>,
    finished: bool,
}

impl<'s> Exchange<'s> {
    pub(crate) fn new(session: &'s Session, mut request: RequestContext) -> Self {
        let navigation = session.tracker.begin();
        if request.csrf_token.is_none() {
            request.csrf_token = session.csrf_token.clone();
        }
        request.timing.mark("exchange_start");

        let recorder = match session.environment {
            Environment::Server => Some(Arc::new(HydrationRecorder::new())),
            Environment::Client => None,
        };

        let mut data = DataClient::new(session.transport.clone(), session.cache.clone(), navigation);
        if let Some(recorder) = &recorder {
            data = data.with_recorder(recorder.clone());
        }
        if let Some(millis) = session.config.fetch_timeout_ms {
            data = data.with_timeout(Duration::from_millis(millis));
        }

        tracing::debug!(
            request_id = %request.request_id,
            url = %request.url,
            environment = %session.environment,
            first_load = navigation.is_first(),
            "Exchange started"
        );

        Self {
            session,
            navigation,
            request,
            response: ResponseState::new(),
            data,
            recorder,
            finished: false,
        }
    }

    /// Navigation kind claimed for this request.
    pub fn navigation(&self) -> NavigationKind {
        self.navigation
    }

    /// Whether this is the first request of the session.
    pub fn is_first_request(&self) -> bool {
        self.navigation.is_first()
    }

    /// The request.
    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    /// The response built so far.
    pub fn response(&self) -> &ResponseState {
        &self.response
    }

    /// Mutable access to the response, for headers set outside a render.
    pub fn response_mut(&mut self) -> &mut ResponseState {
        &mut self.response
    }

    /// Link and form helpers for this request.
    pub fn helpers(&self) -> ViewHelpers<'_> {
        ViewHelpers::new(&self.request, self.session.environment)
    }

    /// Fetch JSON through the session cache.
    pub async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        target: &str,
        options: &FetchOptions,
        cache_options: CacheOptions,
    ) -> Result<T, FetchError> {
        self.data.fetch_json(target, options, cache_options).await
    }

    /// Fetch JSON as an untyped value.
    pub async fn fetch_json_value(
        &self,
        target: &str,
        options: &FetchOptions,
        cache_options: CacheOptions,
    ) -> Result<Value, FetchError> {
        self.data.fetch_json_value(target, options, cache_options).await
    }

    /// Render a view and finalize the response.
    pub fn render_component(
        &mut self,
        content: &str,
        options: RenderOptions,
    ) -> Result<RenderOutcome, DuplexError> {
        let bootstrap = self.bootstrap();
        let mut scope = RenderScope::new(&self.request, &mut self.response);
        if let Some(bootstrap) = &bootstrap {
            scope = scope.with_bootstrap(bootstrap);
        }
        Ok(self.session.renderer.render_component(scope, content, options)?)
    }

    /// Render a failure view. In a client session the response stays open.
    pub fn render_error_component(
        &mut self,
        content: &str,
        options: RenderOptions,
    ) -> Result<RenderOutcome, DuplexError> {
        let bootstrap = self.bootstrap();
        let mut scope = RenderScope::new(&self.request, &mut self.response);
        if let Some(bootstrap) = &bootstrap {
            scope = scope.with_bootstrap(bootstrap);
        }
        Ok(self
            .session
            .renderer
            .render_error_component(scope, content, options)?)
    }

    /// Redirect to `path` with an optional query.
    pub fn navigate(
        &mut self,
        path: &str,
        query: &[(&str, &str)],
        replace: bool,
    ) -> Result<(), DuplexError> {
        let location = location_with_query(path, query);
        self.response.redirect(&location, replace)?;
        Ok(())
    }

    /// Redirect to `location`, pushing a history entry.
    pub fn redirect(&mut self, location: &str) -> Result<(), DuplexError> {
        self.navigate(location, &[], false)
    }

    /// Redirect to the router's mount point, replacing the history entry.
    pub fn redirect_back(&mut self, query: &[(&str, &str)]) -> Result<(), DuplexError> {
        let base = if self.request.base_url.is_empty() {
            "/".to_string()
        } else {
            self.request.base_url.clone()
        };
        self.navigate(&base, query, true)
    }

    /// End the exchange: fire completion analytics if the response is
    /// final, then settle the session's first-request flag.
    ///
    /// Returns `None` when already finished or when the response was left
    /// open.
    pub fn finish(&mut self) -> Option<CompletionReport> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.request.timing.mark("exchange_end");

        let report = self
            .session
            .bridge
            .on_complete(self.navigation, &self.request, &self.response);
        self.session.tracker.mark_request_observed();

        tracing::debug!(
            request_id = %self.request.request_id,
            status = self.response.status().as_u16(),
            finalized = self.response.is_finalized(),
            queued_ms = millis(self.request.timing.since_start("exchange_start")),
            elapsed_ms = millis(self.request.timing.since_start("exchange_end")),
            "Exchange finished"
        );
        report
    }

    /// Finish and convert into an `http::Response`.
    pub fn into_response(mut self) -> http::Response<Vec<u8>> {
        self.finish();
        std::mem::take(&mut self.response).into_http()
    }

    fn bootstrap(&self) -> Option<BootstrapState> {
        let recorder = self.recorder.as_ref()?;
        Some(BootstrapState {
            default_title: Some(self.session.config.default_title.clone()),
            csrf_token: self.request.csrf_token.clone(),
            query_cache: recorder.entries(),
        })
    }
}

fn millis(duration: Option<Duration>) -> u64 {
    duration.map_or(0, |d| d.as_millis() as u64)
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.session.tracker.mark_request_observed();
        }
    }
}
