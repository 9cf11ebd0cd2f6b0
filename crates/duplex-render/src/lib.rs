//! Rendering for both environments behind one contract.
//!
//! This crate provides:
//! - `RenderContract` - `render_component` / `render_error_component` for view code
//! - `SerializingRenderContract` - Server variant producing a full HTML document
//! - `LiveRenderContract` - Client variant mounting into a live document
//! - `Layout` / `RenderEngine` - Seams to the external rendering engine
//! - `DocumentShell` - Document template with bootstrap embedding
//! - `ViewHelpers` - Links and CSRF-carrying forms

mod contract;
mod document;
mod engine;
mod helpers;
mod shell;

pub use contract::*;
pub use document::*;
pub use engine::*;
pub use helpers::*;
pub use shell::*;
