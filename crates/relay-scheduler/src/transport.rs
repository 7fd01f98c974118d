//! Client side of the dispatch wire contract.

use anyhow::{Context, Result};
use async_trait::async_trait;
use relay_core::{DispatchResult, GenerateRequest};
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use tracing::debug;

const TOO_MANY_REQUESTS: u16 = 429;

/// Reported when a 2xx response carries no usable `text`.
pub const NO_TEXT_MESSAGE: &str = "Dispatch endpoint returned no text";

/// Issues one logical generation request.
///
/// Implementations never fail outright: transport problems are folded into
/// [`DispatchResult::Error`].
#[async_trait]
pub trait DispatchTransport: Send + Sync + 'static {
    async fn dispatch(&self, prompt: &str) -> DispatchResult;
}

/// Talks to the relay's HTTP dispatch endpoint.
#[derive(Debug, Clone)]
pub struct HttpDispatchClient {
    endpoint: String,
    fallback_retry_secs: u64,
    client: reqwest::Client,
}

impl HttpDispatchClient {
    pub fn new(endpoint: impl Into<String>, fallback_retry_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client for dispatch endpoint")?;
        Ok(Self {
            endpoint: endpoint.into(),
            fallback_retry_secs: fallback_retry_secs.max(1),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DispatchTransport for HttpDispatchClient {
    async fn dispatch(&self, prompt: &str) -> DispatchResult {
        let request = GenerateRequest {
            prompt: prompt.to_string(),
        };
        let response = match self.client.post(&self.endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                return DispatchResult::error(format!("request to dispatch endpoint failed: {e}"));
            }
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        debug!(status, "Dispatch endpoint responded");

        interpret_response(
            status,
            retry_after.as_deref(),
            &body,
            self.fallback_retry_secs,
        )
    }
}

/// Map an HTTP response from the dispatch endpoint onto a [`DispatchResult`].
///
/// A 2xx only counts as success when it carries a non-empty `text`. For a
/// 429 the wait comes from the `Retry-After` header, then the body's
/// `retryDelay`, then `fallback_secs`; non-positive values are ignored and
/// fractional ones rounded up.
pub fn interpret_response(
    status: u16,
    retry_after: Option<&str>,
    body: &str,
    fallback_secs: u64,
) -> DispatchResult {
    let json = serde_json::from_str::<Value>(body).ok();

    if (200..300).contains(&status) {
        return match json
            .as_ref()
            .and_then(|value| value.get("text"))
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
        {
            Some(text) => DispatchResult::Ok {
                text: text.to_string(),
            },
            None => DispatchResult::error(NO_TEXT_MESSAGE),
        };
    }

    if status == TOO_MANY_REQUESTS {
        let header_secs = retry_after.and_then(|raw| raw.trim().parse::<f64>().ok());
        let body_secs = json
            .as_ref()
            .and_then(|value| value.get("retryDelay"))
            .and_then(Value::as_f64);
        let seconds = [header_secs, body_secs]
            .into_iter()
            .flatten()
            .find(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| secs.ceil() as u64)
            .unwrap_or(fallback_secs);
        return DispatchResult::all_limited(seconds);
    }

    let message = json
        .as_ref()
        .and_then(|value| value.get("error"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request to dispatch endpoint failed with status {status}"));
    DispatchResult::Error { message }
}
