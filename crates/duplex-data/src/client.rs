//! Cache-aware fetch client.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use duplex_cache::{CacheStatus, FetchCache, RequestSignature};
use duplex_core::NavigationKind;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::FetchError;
use crate::request::{CacheOptions, FetchOptions};
use crate::transport::Transport;

/// Collects successful fetch results of a server render.
///
/// The collected map is embedded in the document so the client session
/// starts with the same data the server rendered with.
#[derive(Debug, Default)]
pub struct HydrationRecorder {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl HydrationRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result under its signature.
    pub fn record(&self, signature: &RequestSignature, value: Value) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signature.as_str().to_string(), value);
    }

    /// Copy out everything recorded so far.
    pub fn entries(&self) -> BTreeMap<String, Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Request-scoped data client.
///
/// Cache policy:
/// - On the first load of a session the cache is never read and never
///   written; that render is hydrated fresh.
/// - Afterwards, with `cache` on and `refresh` off, a stored value is
///   returned without touching the network.
/// - Successful network results are stored when `cache` is on.
/// - Failed fetches never create or change an entry.
pub struct DataClient {
    transport: Arc<dyn Transport>,
    cache: Arc<FetchCache>,
    navigation: NavigationKind,
    recorder: Option<Arc<HydrationRecorder>>,
    timeout: Option<Duration>,
}

impl DataClient {
    /// Create a client for one request.
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<FetchCache>,
        navigation: NavigationKind,
    ) -> Self {
        Self {
            transport,
            cache,
            navigation,
            recorder: None,
            timeout: None,
        }
    }

    /// Record successful results for the document bootstrap.
    pub fn with_recorder(mut self, recorder: Arc<HydrationRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Fail fetches that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Navigation kind this client was created for.
    pub fn navigation(&self) -> NavigationKind {
        self.navigation
    }

    /// Fetch and decode JSON into `T`.
    ///
    /// A body that does not decode is a failed fetch and is not stored.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        target: &str,
        options: &FetchOptions,
        cache_options: CacheOptions,
    ) -> Result<T, FetchError> {
        self.fetch_decoded(target, options, cache_options, |value| {
            T::deserialize(value).map_err(FetchError::decode)
        })
        .await
    }

    /// Fetch JSON as an untyped value.
    pub async fn fetch_json_value(
        &self,
        target: &str,
        options: &FetchOptions,
        cache_options: CacheOptions,
    ) -> Result<Value, FetchError> {
        self.fetch_decoded(target, options, cache_options, |value| Ok(value.clone()))
            .await
    }

    async fn fetch_decoded<T>(
        &self,
        target: &str,
        options: &FetchOptions,
        cache_options: CacheOptions,
        decode: impl FnOnce(&Value) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let signature = RequestSignature::from_value(target, &options.to_value());
        let first_load = self.navigation.is_first();

        let status = if first_load || !cache_options.cache {
            CacheStatus::Bypass
        } else if cache_options.refresh {
            CacheStatus::Refresh
        } else if let Some(entry) = self.cache.get(&signature) {
            tracing::debug!(%signature, status = %CacheStatus::Hit, "fetch served from cache");
            return decode(&entry.value);
        } else {
            CacheStatus::Miss
        };

        tracing::debug!(%signature, %status, first_load, "fetching");
        let decoded = self
            .fetch_network(target, options)
            .await
            .and_then(|value| decode(&value).map(|decoded| (value, decoded)));
        let (value, decoded) = match decoded {
            Ok(pair) => pair,
            Err(err) => {
                tracing::debug!(%signature, status_code = err.status_code, "fetch failed");
                return Err(err);
            }
        };

        if cache_options.cache && !first_load {
            self.cache.put(signature.clone(), value.clone());
        }
        if let Some(recorder) = &self.recorder {
            recorder.record(&signature, value);
        }

        Ok(decoded)
    }

    async fn fetch_network(&self, target: &str, options: &FetchOptions) -> Result<Value, FetchError> {
        let request = options.to_transport_request(target);
        let pending = self.transport.send(request);

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                FetchError::new(504, format!("Failed to fetch: timed out after {:?}", limit))
            })??,
            None => pending.await?,
        };

        if !response.is_success() {
            return Err(FetchError::from_status(response.status));
        }
        response.json()
    }
}
