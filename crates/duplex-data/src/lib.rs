//! Cache-aware JSON data client.
//!
//! This crate provides:
//! - `DataClient` - `fetch_json` with the first-load cache policy
//! - `FetchOptions` / `CacheOptions` - Per-call transport and cache options
//! - `FetchError` - The single error surface for every fetch failure
//! - `Transport` - Seam to the network (`ReqwestTransport` by default)
//! - `HydrationRecorder` - Collects server-side results for the bootstrap
//!
//! # Example
//!
//! ```ignore
//! let products: Vec<Product> = client
//!     .fetch_json("/api/products", &FetchOptions::get(), CacheOptions::default())
//!     .await?;
//! ```

mod client;
mod error;
mod request;
mod transport;

pub use client::*;
pub use error::*;
pub use request::*;
pub use transport::*;
