//! Client configuration.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file, then
//! `ACP_*` environment variables.  Callers layer explicit overrides (such as
//! CLI flags) on top by assigning fields directly.
//!
//! ```toml
//! base_url = "http://localhost:8000"
//! timeout_secs = 30
//! session_id = "0191f5a2-6b1c-7cc4-a3f6-3a1b2c3d4e5f"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AcpError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub const ENV_BASE_URL: &str = "ACP_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "ACP_TIMEOUT_SECS";
pub const ENV_SESSION_ID: &str = "ACP_SESSION_ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Server root; a trailing `/` is ignored.
    pub base_url: String,
    /// Whole-request timeout.  Unset means no timeout.
    pub timeout_secs: Option<u64>,
    /// Session every created run is attached to.
    pub session_id: Option<Uuid>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_secs: None,
            session_id: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AcpError::config(format!("failed to parse TOML config: {e}")))
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = ?path, "configuration file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AcpError::config(format!("failed to read config file: {e}")))?;
        let config = Self::from_toml_str(&content)?;

        tracing::debug!(path = ?path, base_url = %config.base_url, "configuration loaded from file");
        Ok(config)
    }

    /// Override fields from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`, which maps a variable name to its value.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = get(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                AcpError::config(format!("invalid {ENV_TIMEOUT_SECS} `{raw}`: {e}"))
            })?;
            self.timeout_secs = Some(secs);
        }
        if let Some(raw) = get(ENV_SESSION_ID) {
            let id = Uuid::parse_str(raw.trim()).map_err(|e| {
                AcpError::config(format!("invalid {ENV_SESSION_ID} `{raw}`: {e}"))
            })?;
            self.session_id = Some(id);
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
