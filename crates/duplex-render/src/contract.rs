//! The render contract and its two environment variants.

use std::sync::{Arc, Mutex, PoisonError};

use duplex_core::{BootstrapState, DuplexConfig, RequestContext, ResponseError, ResponseState};
use http::StatusCode;

use crate::document::{DocumentMeta, LiveDocument, RenderTarget};
use crate::engine::{DefaultLayout, Layout, MarkupEngine, RenderEngine};
use crate::shell::{DocumentShell, HeadContent};

/// Render failures.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Bootstrap serialization failed: {0}")]
    Bootstrap(#[from] serde_json::Error),
}

/// Per-call render options.
#[derive(Clone, Default)]
pub struct RenderOptions {
    /// Document title; the session default applies when absent.
    pub title: Option<String>,
    /// Meta description.
    pub description: Option<String>,
    /// Status code; 200 for renders, 500 for error renders when absent.
    pub status_code: Option<StatusCode>,
    /// Layout override for this call.
    pub layout: Option<Arc<dyn Layout>>,
}

impl RenderOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Override the layout.
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = Some(layout);
        self
    }
}

impl std::fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderOptions")
            .field("title", &self.title)
            .field("description", &self.description)
            .field("status_code", &self.status_code)
            .field("layout", &self.layout.is_some())
            .finish()
    }
}

/// How a render left the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The response was finalized; completion hooks will run.
    FinalizingRender,
    /// The view was shown in place; the response stays open with its
    /// status set.
    InPlaceRender,
}

/// What a render call operates on.
pub struct RenderScope<'a> {
    /// The request being answered.
    pub request: &'a RequestContext,
    /// The response being built.
    pub response: &'a mut ResponseState,
    /// Bootstrap state for serialized documents.
    pub bootstrap: Option<&'a BootstrapState>,
}

impl<'a> RenderScope<'a> {
    /// Scope without bootstrap state.
    pub fn new(request: &'a RequestContext, response: &'a mut ResponseState) -> Self {
        Self {
            request,
            response,
            bootstrap: None,
        }
    }

    /// Attach bootstrap state.
    pub fn with_bootstrap(mut self, bootstrap: &'a BootstrapState) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }
}

/// Uniform rendering capability for view code.
pub trait RenderContract: Send + Sync {
    /// Render a view and finalize the response.
    fn render_component(
        &self,
        scope: RenderScope<'_>,
        content: &str,
        options: RenderOptions,
    ) -> Result<RenderOutcome, RenderError>;

    /// Render a failure view.
    fn render_error_component(
        &self,
        scope: RenderScope<'_>,
        content: &str,
        options: RenderOptions,
    ) -> Result<RenderOutcome, RenderError>;
}

/// Layout, engine and document defaults shared by both variants.
#[derive(Clone)]
struct RenderDefaults {
    engine: Arc<dyn RenderEngine>,
    layout: Arc<dyn Layout>,
    title: String,
    description: Option<String>,
}

impl RenderDefaults {
    fn from_config(config: &DuplexConfig) -> Self {
        Self {
            engine: Arc::new(MarkupEngine),
            layout: Arc::new(DefaultLayout),
            title: config.default_title.clone(),
            description: config.default_description.clone(),
        }
    }

    fn render_markup(
        &self,
        request: &RequestContext,
        content: &str,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let layout = options.layout.as_ref().unwrap_or(&self.layout);
        self.engine.render(layout.as_ref(), content, request)
    }

    fn meta(&self, options: &RenderOptions) -> DocumentMeta {
        DocumentMeta {
            title: Some(options.title.clone().unwrap_or_else(|| self.title.clone())),
            description: options
                .description
                .clone()
                .or_else(|| self.description.clone()),
        }
    }
}

/// Server variant: renders a complete HTML document into the response body.
///
/// Both success and error renders finalize; a one-shot request has no
/// session to keep open.
#[derive(Clone)]
pub struct SerializingRenderContract {
    defaults: RenderDefaults,
    container_id: String,
    bootstrap_script_id: String,
}

impl SerializingRenderContract {
    /// Create a contract from session configuration.
    pub fn new(config: &DuplexConfig) -> Self {
        Self {
            defaults: RenderDefaults::from_config(config),
            container_id: config.app_container_id.clone(),
            bootstrap_script_id: config.bootstrap_script_id.clone(),
        }
    }

    /// Use a different rendering engine.
    pub fn with_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.defaults.engine = engine;
        self
    }

    /// Use a different default layout.
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.defaults.layout = layout;
        self
    }

    fn serialize(
        &self,
        scope: RenderScope<'_>,
        content: &str,
        options: RenderOptions,
        default_status: StatusCode,
    ) -> Result<RenderOutcome, RenderError> {
        let body = self.defaults.render_markup(scope.request, content, &options)?;

        let meta = self.defaults.meta(&options);
        let mut head = HeadContent::default();
        head.title = meta.title;
        if let Some(description) = &meta.description {
            head = head.with_meta("description", description);
        }

        let mut shell = DocumentShell::new(head).with_container_id(&self.container_id);
        if let Some(bootstrap) = scope.bootstrap {
            shell = shell.with_bootstrap(&self.bootstrap_script_id, bootstrap.to_script_json()?);
        }

        let status = options.status_code.unwrap_or(default_status);
        scope.response.set_header("content-type", "text/html")?;
        scope.response.set_body(shell.render(&body))?;
        scope.response.finalize(status)?;

        tracing::debug!(url = %scope.request.url, status = status.as_u16(), "Serialized document");
        Ok(RenderOutcome::FinalizingRender)
    }
}

impl RenderContract for SerializingRenderContract {
    fn render_component(
        &self,
        scope: RenderScope<'_>,
        content: &str,
        options: RenderOptions,
    ) -> Result<RenderOutcome, RenderError> {
        self.serialize(scope, content, options, StatusCode::OK)
    }

    fn render_error_component(
        &self,
        scope: RenderScope<'_>,
        content: &str,
        options: RenderOptions,
    ) -> Result<RenderOutcome, RenderError> {
        self.serialize(scope, content, options, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Client variant: mounts into the live document.
///
/// The first render mounts a root into the document's container; later
/// renders reuse it. Error renders set the status and leave the response
/// open so the session stays interactive.
pub struct LiveRenderContract {
    defaults: RenderDefaults,
    document: Arc<dyn LiveDocument>,
    root: Mutex<Option<Box<dyn RenderTarget>>>,
}

impl LiveRenderContract {
    /// Create a contract bound to `document`.
    pub fn new(config: &DuplexConfig, document: Arc<dyn LiveDocument>) -> Self {
        Self {
            defaults: RenderDefaults::from_config(config),
            document,
            root: Mutex::new(None),
        }
    }

    /// Use a different rendering engine.
    pub fn with_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.defaults.engine = engine;
        self
    }

    /// Use a different default layout.
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.defaults.layout = layout;
        self
    }

    /// Replace the default title, e.g. with the one from a bootstrap payload.
    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.defaults.title = title.into();
        self
    }

    /// Whether a root has been mounted.
    pub fn is_mounted(&self) -> bool {
        self.root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn mount(
        &self,
        request: &RequestContext,
        content: &str,
        options: &RenderOptions,
    ) -> Result<(), RenderError> {
        let markup = self.defaults.render_markup(request, content, options)?;
        let container = self.document.render_document(&self.defaults.meta(options));

        let mut root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        root.get_or_insert(container).render(&markup);
        Ok(())
    }
}

impl RenderContract for LiveRenderContract {
    fn render_component(
        &self,
        scope: RenderScope<'_>,
        content: &str,
        options: RenderOptions,
    ) -> Result<RenderOutcome, RenderError> {
        self.mount(scope.request, content, &options)?;
        scope
            .response
            .finalize(options.status_code.unwrap_or(StatusCode::OK))?;
        Ok(RenderOutcome::FinalizingRender)
    }

    fn render_error_component(
        &self,
        scope: RenderScope<'_>,
        content: &str,
        options: RenderOptions,
    ) -> Result<RenderOutcome, RenderError> {
        self.mount(scope.request, content, &options)?;
        scope.response.set_status(
            options
                .status_code
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        )?;
        Ok(RenderOutcome::InPlaceRender)
    }
}
