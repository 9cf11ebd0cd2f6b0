//! Live document binding for the client environment.

use std::sync::{Arc, Mutex, PoisonError};

/// Document-level values applied on every live render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    /// Document title.
    pub title: Option<String>,
    /// Meta description.
    pub description: Option<String>,
}

/// A mounted container that can display markup.
pub trait RenderTarget: Send {
    /// Replace the container's contents.
    fn render(&mut self, markup: &str);
}

/// The running page: `render_document({title, description}) -> renderTarget`.
pub trait LiveDocument: Send + Sync {
    /// Apply `meta` to the document and return its application container.
    fn render_document(&self, meta: &DocumentMeta) -> Box<dyn RenderTarget>;
}

#[derive(Debug, Default)]
struct HeadlessState {
    meta: DocumentMeta,
    containers_issued: usize,
    markup: Option<String>,
    mounted_by: Option<usize>,
    renders: usize,
}

/// In-memory document for headless hosts.
///
/// Records the applied title and mounted markup; clones share state.
#[derive(Debug, Clone, Default)]
pub struct HeadlessDocument {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Title currently applied.
    pub fn title(&self) -> Option<String> {
        self.lock().meta.title.clone()
    }

    /// Description currently applied.
    pub fn description(&self) -> Option<String> {
        self.lock().meta.description.clone()
    }

    /// Markup currently mounted.
    pub fn markup(&self) -> Option<String> {
        self.lock().markup.clone()
    }

    /// Number of containers handed out by `render_document`.
    pub fn containers_issued(&self) -> usize {
        self.lock().containers_issued
    }

    /// Index of the container that rendered the current markup.
    pub fn mounted_by(&self) -> Option<usize> {
        self.lock().mounted_by
    }

    /// Total renders into any container.
    pub fn renders(&self) -> usize {
        self.lock().renders
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LiveDocument for HeadlessDocument {
    fn render_document(&self, meta: &DocumentMeta) -> Box<dyn RenderTarget> {
        let mut state = self.lock();
        state.meta = meta.clone();
        let index = state.containers_issued;
        state.containers_issued += 1;
        Box::new(HeadlessContainer {
            index,
            state: self.state.clone(),
        })
    }
}

struct HeadlessContainer {
    index: usize,
    state: Arc<Mutex<HeadlessState>>,
}

impl RenderTarget for HeadlessContainer {
    fn render(&mut self, markup: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.markup = Some(markup.to_string());
        state.mounted_by = Some(self.index);
        state.renders += 1;
    }
}
