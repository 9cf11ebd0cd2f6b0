//! Seams to the external rendering engine.

use duplex_core::RequestContext;

use crate::contract::RenderError;

/// Wraps rendered view content in page chrome.
pub trait Layout: Send + Sync {
    /// Produce the page markup around `content`.
    fn render(&self, content: &str, request: &RequestContext) -> String;
}

/// `<div class="sitewrapper"><div class="content">…</div></div>`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLayout;

impl Layout for DefaultLayout {
    fn render(&self, content: &str, _request: &RequestContext) -> String {
        format!(
            "<div class=\"sitewrapper\"><div class=\"content\">{}</div></div>",
            content
        )
    }
}

/// The rendering engine: `render(layout, {content, context}) -> output`.
pub trait RenderEngine: Send + Sync {
    /// Render `content` through `layout`.
    fn render(
        &self,
        layout: &dyn Layout,
        content: &str,
        request: &RequestContext,
    ) -> Result<String, RenderError>;
}

/// Engine for views that already produce markup strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupEngine;

impl RenderEngine for MarkupEngine {
    fn render(
        &self,
        layout: &dyn Layout,
        content: &str,
        request: &RequestContext,
    ) -> Result<String, RenderError> {
        Ok(layout.render(content, request))
    }
}
