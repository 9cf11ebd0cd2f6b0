//! Public SDK for dual-environment request handling.
//!
//! A [`Session`] is built once per physical session: one per server
//! request, or one per client page load spanning every in-page navigation.
//! Each request inside it is an [`Exchange`].
//!
//! ```ignore
//! use duplex_sdk::prelude::*;
//!
//! let session = SessionBuilder::server(DuplexConfig::default()).build();
//! let mut exchange = session.exchange(RequestContext::from_http(&request));
//!
//! let products: Vec<Product> = exchange
//!     .fetch_json("/api/products", &FetchOptions::get(), CacheOptions::default())
//!     .await?;
//! exchange.render_component(&list(&products), RenderOptions::new().with_title("Products"))?;
//!
//! let response = exchange.into_response();
//! ```

mod error;
mod exchange;
mod session;

pub mod prelude;

pub use duplex_analytics;
pub use duplex_cache;
pub use duplex_core;
pub use duplex_data;
pub use duplex_render;

pub use error::*;
pub use exchange::*;
pub use session::*;
