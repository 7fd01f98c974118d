use async_trait::async_trait;
use relay_config::Credential;

/// A failed call to the model provider.
///
/// Carries whatever the transport exposed: HTTP status, the raw
/// `Retry-After` header and the response body. Any of them may be absent
/// (e.g. connection failures have no status).
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub retry_after: Option<String>,
    pub body: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Textual representation searched by the classifiers: body first, then
    /// the message.
    pub fn text(&self) -> String {
        match &self.body {
            Some(body) if !body.is_empty() => format!("{}\n{}", body, self.message),
            _ => self.message.clone(),
        }
    }
}

/// One remote generation call made with a single credential.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Returns the generated text, which may be empty; the dispatcher decides
    /// what an empty payload means.
    async fn generate(&self, credential: &Credential, prompt: &str)
    -> Result<String, ProviderError>;
}
