//! State handed from a server-rendered document to the client session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Bootstrap payload embedded in the serialized document.
///
/// The server records every successful data fetch of the first load here,
/// keyed by request signature, so the client session can start with a warm
/// fetch cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapState {
    /// Title used when a render supplies none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_title: Option<String>,
    /// CSRF token for the session's form posts and analytics relays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    /// Fetch results keyed by request signature.
    #[serde(default)]
    pub query_cache: BTreeMap<String, serde_json::Value>,
}

impl BootstrapState {
    /// Create an empty bootstrap payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default title.
    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = Some(title.into());
        self
    }

    /// Set the CSRF token.
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Serialize for embedding inside a `<script>` element.
    ///
    /// `</` is escaped so a cached string cannot close the script early.
    pub fn to_script_json(&self) -> Result<String, serde_json::Error> {
        Ok(serde_json::to_string(self)?.replace("</", "<\\/"))
    }

    /// Parse a payload previously produced by [`Self::to_script_json`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
