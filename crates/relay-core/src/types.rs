use serde::{Deserialize, Serialize};

/// Error text returned alongside a 429 when every credential is limited.
pub const ALL_LIMITED_MESSAGE: &str = "All API keys are rate-limited.";

/// Body of a generation request sent to the dispatch endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

/// Successful generation response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
}

/// Body of any non-success, non-429 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of a 429 response. `retry_delay` mirrors the `Retry-After` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedBody {
    pub error: String,
    pub retry_delay: u64,
}

/// Outcome of one logical dispatch, possibly spanning several credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// The first credential that produced non-empty text won.
    Ok { text: String },
    /// Every credential tried was rate-limited; retry after this many seconds.
    AllLimited { retry_after_seconds: u64 },
    /// Non-retryable failure, surfaced to the caller as-is.
    Error { message: String },
}

impl DispatchResult {
    /// Build an `AllLimited` result, clamping the wait to at least one second.
    pub fn all_limited(retry_after_seconds: u64) -> Self {
        Self::AllLimited {
            retry_after_seconds: retry_after_seconds.max(1),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "ok",
            Self::AllLimited { .. } => "all_limited",
            Self::Error { .. } => "error",
        }
    }
}
