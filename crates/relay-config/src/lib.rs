//! Relay configuration (`~/.config/integration-relay/config.toml`) and the
//! process-wide credential pool.

pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{ClientConfig, DispatchConfig, ProviderConfig, RelayConfig, ServerConfig};
pub use credentials::{Credential, CredentialPool, DEFAULT_CREDENTIALS_ENV};
