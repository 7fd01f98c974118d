//! 429 / rate-limit detection from provider errors.

use serde::Serialize;

use crate::client::ProviderError;

const RATE_LIMIT_STATUS: u16 = 429;

/// Case-insensitive phrases that mark an error as rate-limited.
const RATE_LIMIT_PATTERNS: &[&str] = &["too many requests", "quota exceeded", "rate limit"];

/// Information about a detected rate-limit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDetected {
    pub matched_pattern: String,
}

/// Check a provider error for rate-limit indicators.
///
/// An HTTP 429 status wins outright; otherwise the error text is searched for
/// the known phrases and the first match is reported.
pub fn detect_rate_limit(err: &ProviderError) -> Option<RateLimitDetected> {
    if err.status == Some(RATE_LIMIT_STATUS) {
        return Some(RateLimitDetected {
            matched_pattern: format!("status {RATE_LIMIT_STATUS}"),
        });
    }

    let text = err.text().to_lowercase();
    RATE_LIMIT_PATTERNS
        .iter()
        .find(|pattern| text.contains(*pattern))
        .map(|pattern| RateLimitDetected {
            matched_pattern: pattern.to_string(),
        })
}
