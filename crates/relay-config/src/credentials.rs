//! Credential pool sourced from a single process-wide environment variable.
//!
//! The variable holds a comma-delimited token list (`key1,key2,key3`). Order
//! is preserved and defines failover precedence. Tokens are never printed:
//! `Debug` and [`Credential::label`] only expose the position and a short
//! suffix.

use std::fmt;

use relay_core::RelayError;

/// Environment variable read when the config does not name another one.
pub const DEFAULT_CREDENTIALS_ENV: &str = "GOOGLE_API_KEYS";

/// One opaque provider token plus its position in the pool.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    token: String,
}

impl Credential {
    pub fn new(index: usize, token: impl Into<String>) -> Self {
        Self {
            index,
            token: token.into(),
        }
    }

    /// Zero-based position in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Log-safe identifier, e.g. `#2 (…a1b2)`.
    pub fn label(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        if chars.len() > 8 {
            let suffix: String = chars[chars.len() - 4..].iter().collect();
            format!("#{} (…{})", self.index + 1, suffix)
        } else {
            format!("#{}", self.index + 1)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.label()).finish()
    }
}

/// Ordered, immutable set of credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    /// Build a pool from tokens, trimming whitespace and dropping empty entries.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials = tokens
            .into_iter()
            .filter_map(|token| {
                let trimmed = token.as_ref().trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .enumerate()
            .map(|(index, token)| Credential::new(index, token))
            .collect();
        Self { credentials }
    }

    /// Parse a comma-delimited token list.
    pub fn parse(raw: &str) -> Self {
        Self::from_tokens(raw.split(','))
    }

    /// Read the pool from `env_var`. A missing variable yields an empty pool.
    pub fn from_env(env_var: &str) -> Self {
        let raw = std::env::var(env_var).unwrap_or_default();
        let pool = Self::parse(&raw);
        tracing::debug!(env_var, credentials = pool.len(), "Loaded credential pool");
        pool
    }

    pub fn ensure_non_empty(&self, env_var: &str) -> Result<(), RelayError> {
        if self.is_empty() {
            return Err(RelayError::NoCredentials {
                env_var: env_var.to_string(),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }
}
