//! Core abstractions shared by the server and client environments.
//!
//! This crate provides the fundamental types:
//! - `RequestContext` - Typed view of an inbound request
//! - `ResponseState` - Response status/body with an explicit finalize step
//! - `NavigationTracker` - First-load vs. client-navigation tracking
//! - `BootstrapState` - State handed from the server document to the client
//! - `DuplexConfig` - Session-wide configuration

mod bootstrap;
mod config;
mod context;
mod lifecycle;
mod navigation;

pub use bootstrap::*;
pub use config::*;
pub use context::*;
pub use lifecycle::*;
pub use navigation::*;
