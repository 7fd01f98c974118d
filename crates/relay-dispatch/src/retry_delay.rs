//! Retry timing extraction from rate-limited provider errors.
//!
//! Sources, in priority order (first match wins):
//! 1. the `Retry-After` header (seconds, or an HTTP-date);
//! 2. a structured `"retryDelay": "<n>s"` field in the error body;
//! 3. free text such as `Please retry in 22.85s`, rounded up.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::client::ProviderError;

struct RetryPatterns {
    retry_info: Regex,
    free_text: Regex,
}

fn build_retry_patterns() -> Option<RetryPatterns> {
    Some(RetryPatterns {
        // Tolerates the escaped form that appears when the body is itself
        // embedded in a JSON string.
        retry_info: Regex::new(r#"(?i)\\?"retryDelay\\?"\s*:\s*\\?"(\d+)s\\?""#).ok()?,
        free_text: Regex::new(r"(?i)retry in (\d+(?:\.\d+)?)s").ok()?,
    })
}

fn retry_patterns() -> Option<&'static RetryPatterns> {
    static PATTERNS: OnceLock<Option<RetryPatterns>> = OnceLock::new();
    PATTERNS.get_or_init(build_retry_patterns).as_ref()
}

/// Seconds to wait before the credential behind `err` is worth retrying, or
/// `None` when the error carries no recognisable timing.
pub fn extract_retry_delay_seconds(err: &ProviderError) -> Option<f64> {
    if let Some(seconds) = err.retry_after.as_deref().and_then(parse_retry_after_header) {
        return Some(seconds);
    }

    let patterns = retry_patterns()?;
    let text = err.text();

    if let Some(seconds) = capture_seconds(&patterns.retry_info, &text) {
        return Some(seconds);
    }

    capture_seconds(&patterns.free_text, &text).map(f64::ceil)
}

/// Parse a `Retry-After` value: a positive number of seconds, or an HTTP-date
/// that lies in the future.
pub fn parse_retry_after_header(raw: &str) -> Option<f64> {
    let raw = raw.trim();

    if let Ok(seconds) = raw.parse::<f64>() {
        return (seconds.is_finite() && seconds > 0.0).then_some(seconds);
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let seconds = (retry_at - Utc::now()).num_seconds();
    (seconds > 0).then_some(seconds as f64)
}

fn capture_seconds(pattern: &Regex, text: &str) -> Option<f64> {
    let captured = pattern.captures(text)?.get(1)?.as_str();
    let seconds = captured.parse::<f64>().ok()?;
    (seconds > 0.0).then_some(seconds)
}
