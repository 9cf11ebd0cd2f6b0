//! Execution environment and first-load tracking.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Where a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// One-shot document render. Every server session serves a single load.
    Server,
    /// Long-lived in-page session reusing state across navigations.
    Client,
}

impl Environment {
    /// Whether the passive completion log of the first load is dropped here.
    ///
    /// The server already logged the document load that started a client
    /// session, so only the client suppresses it.
    pub fn suppresses_first_load_log(&self) -> bool {
        matches!(self, Self::Client)
    }

    /// Get the name of this environment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How a single request relates to its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// The request that loaded the document.
    FirstLoad,
    /// Any later in-page navigation.
    ClientNavigation,
}

impl NavigationKind {
    /// Whether this is the first request of the session.
    pub fn is_first(&self) -> bool {
        matches!(self, Self::FirstLoad)
    }
}

const FRESH: u8 = 0;
const FIRST_IN_FLIGHT: u8 = 1;
const SETTLED: u8 = 2;

/// Session-scoped first-request flag.
///
/// `begin` hands out `FirstLoad` to exactly one request per session, even
/// under concurrent callers; the read-then-flip is a single atomic
/// compare-exchange. `is_first_request` stays true until
/// `mark_request_observed` settles the flag, after which it is false for the
/// rest of the session.
#[derive(Debug, Default)]
pub struct NavigationTracker {
    state: AtomicU8,
}

impl NavigationTracker {
    /// Create a tracker for a fresh session.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(FRESH),
        }
    }

    /// Claim the navigation kind for a new request.
    pub fn begin(&self) -> NavigationKind {
        match self
            .state
            .compare_exchange(FRESH, FIRST_IN_FLIGHT, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => NavigationKind::FirstLoad,
            Err(_) => NavigationKind::ClientNavigation,
        }
    }

    /// Whether the first response of the session has not yet completed.
    ///
    /// Session-wide state. A request that overlaps the first one reads true
    /// here while holding `ClientNavigation` from [`begin`](Self::begin);
    /// per-request policy uses the claimed kind.
    pub fn is_first_request(&self) -> bool {
        self.state.load(Ordering::Acquire) != SETTLED
    }

    /// Record that a response completed. Idempotent.
    pub fn mark_request_observed(&self) {
        self.state.store(SETTLED, Ordering::Release);
    }
}
