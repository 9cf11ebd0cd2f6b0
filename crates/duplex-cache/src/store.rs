//! Session-scoped fetch result store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::signature::RequestSignature;

/// How a fetch was resolved with respect to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from the cache, no network call.
    Hit,
    /// No usable entry; fetched from the network.
    Miss,
    /// Cache skipped (first load or caching disabled).
    Bypass,
    /// Entry ignored on request; fetched and overwritten.
    Refresh,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Bypass => write!(f, "BYPASS"),
            Self::Refresh => write!(f, "REFRESH"),
        }
    }
}

/// A stored fetch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Signature the value was stored under.
    pub signature: RequestSignature,
    /// The decoded response payload.
    pub value: Value,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// Session-scoped store of successful fetch results.
///
/// Entries never expire; they are only overwritten by a later `put` for the
/// same signature or dropped with the session. Growth is unbounded.
#[derive(Debug, Default)]
pub struct FetchCache {
    entries: RwLock<HashMap<RequestSignature, CacheEntry>>,
}

impl FetchCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry.
    pub fn get(&self, signature: &RequestSignature) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(signature)
            .cloned()
    }

    /// Store a value, replacing any previous entry for the signature.
    pub fn put(&self, signature: RequestSignature, value: Value) {
        let entry = CacheEntry {
            signature: signature.clone(),
            value,
            created_at: Utc::now(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signature, entry);
    }

    /// Whether an entry exists for the signature.
    pub fn contains(&self, signature: &RequestSignature) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(signature)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load entries from a bootstrap payload. Returns the number loaded.
    pub fn seed<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut count = 0;
        for (key, value) in entries {
            self.put(RequestSignature::from_raw(key), value);
            count += 1;
        }
        count
    }

    /// Copy all entries out as signature -> value.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(sig, entry)| (sig.as_str().to_string(), entry.value.clone()))
            .collect()
    }
}
