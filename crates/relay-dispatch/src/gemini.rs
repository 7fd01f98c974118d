//! Gemini `generateContent` client.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use relay_config::{Credential, ProviderConfig};
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::client::{ModelClient, ProviderError};

const API_KEY_HEADER: &str = "x-goog-api-key";
const API_PATH: &str = "v1beta/models";
/// Longest slice of a non-JSON error body kept in an error message.
const MAX_BODY_SNIPPET: usize = 200;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .context("failed to build HTTP client for model provider")?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.request_timeout(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_url(&self) -> String {
        format!("{}/{API_PATH}/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let url = self.model_url();
        debug!(model = %self.model, credential = %credential.label(), "Sending request to Gemini");

        // Key travels in a header so it never shows up in URL-bearing errors.
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, credential.token())
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("request to model provider failed: {e}")))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| {
            ProviderError::new(format!("failed to read model provider response: {e}"))
                .with_status(status.as_u16())
        })?;

        if !status.is_success() {
            let mut err = ProviderError::new(format!(
                "model provider returned {status}: {}",
                provider_error_message(&body)
            ))
            .with_status(status.as_u16())
            .with_body(body);
            err.retry_after = retry_after;
            return Err(err);
        }

        parse_generate_content(&body)
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Text of the first candidate, parts concatenated. A response without
/// candidates (e.g. a blocked prompt) yields empty text.
fn parse_generate_content(body: &str) -> Result<String, ProviderError> {
    let response: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::new(format!("invalid response from model provider: {e}")).with_body(body)
    })?;

    Ok(response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

/// `error.message` from a Google API error body, or a trimmed snippet of the
/// raw body when it is not JSON.
fn provider_error_message(body: &str) -> String {
    if let Some(message) = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.pointer("/error/message")?.as_str().map(str::to_string))
    {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty error body".to_string();
    }
    trimmed.chars().take(MAX_BODY_SNIPPET).collect()
}
