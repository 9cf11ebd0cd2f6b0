//! Request signatures and the session-scoped fetch cache.
//!
//! This crate provides:
//! - `RequestSignature` - Stable key for an outbound data fetch
//! - `FetchCache` - Unbounded, session-scoped store of fetch results
//! - `CacheStatus` - How a lookup was resolved
//!
//! # Example
//!
//! ```ignore
//! use duplex_cache::{FetchCache, RequestSignature};
//! use serde_json::json;
//!
//! let cache = FetchCache::new();
//! let sig = RequestSignature::from_value("/api/products", &json!({"method": "GET"}));
//! cache.put(sig.clone(), json!([1, 2, 3]));
//! assert!(cache.get(&sig).is_some());
//! ```

mod signature;
mod store;

pub use signature::*;
pub use store::*;
