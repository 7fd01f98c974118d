//! Relay configuration loaded from `~/.config/integration-relay/config.toml`.
//!
//! Every section is optional; a missing file yields the defaults. Credentials
//! are never stored here: the file only names the environment variable that
//! holds them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::{CredentialPool, DEFAULT_CREDENTIALS_ENV};
use crate::paths;

const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ROUTE: &str = "/api/gemini";
const DEFAULT_PROVIDER_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
const DEFAULT_RETRY_SECS: f64 = 20.0;
const DEFAULT_RETRY_BUFFER_SECS: f64 = 2.0;
const DEFAULT_CLIENT_FALLBACK_SECS: u64 = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Dispatch endpoint listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path the generation endpoint is mounted on.
    #[serde(default = "default_route")]
    pub route: String,
}

impl ServerConfig {
    /// `bind:port` string for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            route: default_route(),
        }
    }
}

/// Remote model provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the comma-delimited tokens.
    #[serde(default = "default_credentials_env")]
    pub credentials_env: String,
    /// Per-call HTTP timeout. None = rely on the transport defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_provider_endpoint(),
            model: default_model(),
            credentials_env: default_credentials_env(),
            request_timeout_secs: None,
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Failover tuning for the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Wait recorded for a rate-limited credential whose error carried no
    /// parseable retry timing. A heuristic, not a provider guarantee.
    #[serde(default = "default_retry_secs")]
    pub default_retry_secs: f64,
    /// Added to the shortest wait before it is reported to clients.
    #[serde(default = "default_retry_buffer_secs")]
    pub retry_buffer_secs: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_retry_secs: default_retry_secs(),
            retry_buffer_secs: default_retry_buffer_secs(),
        }
    }
}

/// Settings for the `generate` client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Full URL of the dispatch endpoint.
    #[serde(default = "default_client_endpoint")]
    pub endpoint: String,
    /// Wait used when a 429 carries neither a header nor a body delay.
    #[serde(default = "default_client_fallback_secs")]
    pub fallback_retry_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_client_endpoint(),
            fallback_retry_secs: default_client_fallback_secs(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_route() -> String {
    DEFAULT_ROUTE.to_string()
}

fn default_provider_endpoint() -> String {
    DEFAULT_PROVIDER_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_credentials_env() -> String {
    DEFAULT_CREDENTIALS_ENV.to_string()
}

fn default_retry_secs() -> f64 {
    DEFAULT_RETRY_SECS
}

fn default_retry_buffer_secs() -> f64 {
    DEFAULT_RETRY_BUFFER_SECS
}

fn default_client_endpoint() -> String {
    format!("http://{DEFAULT_BIND}:{DEFAULT_PORT}{DEFAULT_ROUTE}")
}

fn default_client_fallback_secs() -> u64 {
    DEFAULT_CLIENT_FALLBACK_SECS
}

impl RelayConfig {
    /// Load the config.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used and a missing file (or an unresolvable home directory) yields
    /// `Default`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        let Some(default_path) = paths::config_file() else {
            return Ok(Self::default());
        };
        if !default_path.exists() {
            tracing::debug!(path = %default_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(&default_path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read relay config: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse relay config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded relay config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.dispatch.default_retry_secs.is_finite() && self.dispatch.default_retry_secs > 0.0,
            "dispatch.default_retry_secs must be a positive number"
        );
        anyhow::ensure!(
            self.dispatch.retry_buffer_secs.is_finite() && self.dispatch.retry_buffer_secs >= 0.0,
            "dispatch.retry_buffer_secs must not be negative"
        );
        anyhow::ensure!(
            self.server.route.starts_with('/'),
            "server.route must start with '/'"
        );
        anyhow::ensure!(
            self.client.fallback_retry_secs > 0,
            "client.fallback_retry_secs must be at least 1"
        );
        Ok(())
    }

    /// Load the credential pool named by `provider.credentials_env`.
    pub fn credential_pool(&self) -> CredentialPool {
        CredentialPool::from_env(&self.provider.credentials_env)
    }

    /// Default config TOML with comments, used by `relay config init`.
    pub fn default_template() -> String {
        r#"# Integration relay configuration
# Location: ~/.config/integration-relay/config.toml
#
# Credentials are NOT stored here. Export them as a comma-separated list:
#   export GOOGLE_API_KEYS=key1,key2,key3

[server]
bind = "127.0.0.1"
port = 3000
route = "/api/gemini"

[provider]
endpoint = "https://generativelanguage.googleapis.com"
model = "gemini-2.5-flash-lite"
credentials_env = "GOOGLE_API_KEYS"
# request_timeout_secs = 60

[dispatch]
default_retry_secs = 20.0  # used when a 429 carries no retry timing
retry_buffer_secs = 2.0    # added to the shortest wait across credentials

[client]
endpoint = "http://127.0.0.1:3000/api/gemini"
fallback_retry_secs = 20
"#
        .to_string()
    }

    /// Write the default template, creating directories as needed.
    /// Returns the path written.
    pub fn save_default_template(path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => paths::config_file().context("Failed to determine config directory")?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&path, Self::default_template())
            .with_context(|| format!("Failed to write relay config: {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
