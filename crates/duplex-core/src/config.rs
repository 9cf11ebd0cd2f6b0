//! Session-wide configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Error loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration shared by both environments.
///
/// Every field has a default, so a TOML file only lists what it changes:
///
/// ```toml
/// app_name = "storefront"
/// default_title = "Storefront"
/// analytics_endpoint = "/analytics"
/// fetch_timeout_ms = 3000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplexConfig {
    /// Application name.
    pub app_name: String,
    /// Title used when a render supplies none.
    pub default_title: String,
    /// Description used when a render supplies none.
    pub default_description: Option<String>,
    /// Path the client relays analytics events to.
    pub analytics_endpoint: String,
    /// Cookie carrying the session identifier.
    pub session_cookie: String,
    /// Element id the application is mounted into.
    pub app_container_id: String,
    /// Element id of the bootstrap `<script>` payload.
    pub bootstrap_script_id: String,
    /// Optional timeout for outbound data fetches.
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for DuplexConfig {
    fn default() -> Self {
        Self {
            app_name: "duplex".to_string(),
            default_title: "Duplex".to_string(),
            default_description: None,
            analytics_endpoint: "/analytics".to_string(),
            session_cookie: "sessionId".to_string(),
            app_container_id: "app".to_string(),
            bootstrap_script_id: "__DUPLEX_STATE__".to_string(),
            fetch_timeout_ms: None,
        }
    }
}

impl DuplexConfig {
    /// Create a configuration with the given app name.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Parse from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Set the default page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    /// Set the default page description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.default_description = Some(description.into());
        self
    }

    /// Set the analytics relay endpoint.
    pub fn with_analytics_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.analytics_endpoint = endpoint.into();
        self
    }

    /// Set the session cookie name.
    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    /// Set the fetch timeout.
    pub fn with_fetch_timeout_ms(mut self, millis: u64) -> Self {
        self.fetch_timeout_ms = Some(millis);
        self
    }
}
