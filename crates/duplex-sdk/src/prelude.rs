//! Prelude for convenient imports.
//!
//! ```ignore
//! use duplex_sdk::prelude::*;
//! ```

pub use duplex_analytics::{
    AnalyticsHandlers, AnalyticsHit, AnalyticsRouter, CompletionReport, DeliverySink, Emitter,
    LogDisposition, Routed,
};
pub use duplex_core::{
    BootstrapState, DuplexConfig, Environment, NavigationKind, RequestContext, ResponseState,
};
pub use duplex_data::{CacheOptions, FetchError, FetchOptions, Transport};
pub use duplex_render::{
    FormTarget, Layout, LiveDocument, RenderEngine, RenderOptions, RenderOutcome, ViewHelpers,
};

pub use crate::{DuplexError, Exchange, Session, SessionBuilder};
