//! Downstream data service endpoint configuration.
//!
//! Two ways to supply the bearer credential are supported, in order of
//! precedence: an environment variable name, or the token inline in the
//! config file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the downstream data service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service root URL, e.g. `https://host/odata/v4/catalog`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Header used to pass the credential. Defaults to `Authorization`.
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// Environment variable containing the credential value. Highest
    /// precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token_env: Option<String>,

    /// Credential value supplied inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_header: default_auth_header(),
            auth_token_env: None,
            auth_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl ServiceConfig {
    /// Resolve the credential, checking the environment variable first.
    pub fn credential(&self) -> Option<String> {
        if let Some(env_var) = &self.auth_token_env
            && let Ok(token) = std::env::var(env_var)
        {
            return Some(token);
        }
        self.auth_token.clone()
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}
