//! Per-credential outcome classification.

use crate::client::ProviderError;
use crate::rate_limit::detect_rate_limit;
use crate::retry_delay::extract_retry_delay_seconds;

const INVALID_CREDENTIAL_PATTERNS: &[&str] = &["api key not valid", "api_key_invalid"];

/// Message used when the provider answered successfully with no text.
pub const EMPTY_RESPONSE_MESSAGE: &str = "Empty response from model provider";

/// What one attempt with one credential amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success { text: String },
    /// Temporarily exhausted. `wait_seconds` is None when the error carried
    /// no usable timing; `matched_pattern` names the indicator that fired.
    RateLimited {
        wait_seconds: Option<f64>,
        matched_pattern: String,
    },
    /// Permanently unusable for this request.
    InvalidCredential,
    /// Anything else; aborts the whole dispatch.
    Fatal { message: String },
}

/// Classify the result of a single remote call.
///
/// Empty text is an error condition, not a success.
pub fn classify_attempt(result: Result<String, ProviderError>) -> AttemptOutcome {
    match result {
        Ok(text) if !text.is_empty() => AttemptOutcome::Success { text },
        Ok(_) => classify_error(&ProviderError::new(EMPTY_RESPONSE_MESSAGE)),
        Err(err) => classify_error(&err),
    }
}

/// Classify a provider error. Rate limiting is checked first, so a 429 that
/// also mentions an invalid key is still treated as transient.
pub fn classify_error(err: &ProviderError) -> AttemptOutcome {
    if let Some(detected) = detect_rate_limit(err) {
        return AttemptOutcome::RateLimited {
            wait_seconds: extract_retry_delay_seconds(err),
            matched_pattern: detected.matched_pattern,
        };
    }

    if is_invalid_credential(err) {
        return AttemptOutcome::InvalidCredential;
    }

    AttemptOutcome::Fatal {
        message: err.to_string(),
    }
}

pub fn is_invalid_credential(err: &ProviderError) -> bool {
    let text = err.text().to_lowercase();
    INVALID_CREDENTIAL_PATTERNS
        .iter()
        .any(|pattern| text.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_is_success() {
        assert_eq!(
            classify_attempt(Ok("connections".into())),
            AttemptOutcome::Success {
                text: "connections".into()
            }
        );
    }

    #[test]
    fn test_empty_text_is_fatal() {
        assert_eq!(
            classify_attempt(Ok(String::new())),
            AttemptOutcome::Fatal {
                message: EMPTY_RESPONSE_MESSAGE.into()
            }
        );
    }

    #[test]
    fn test_rate_limited_with_timing() {
        let err = ProviderError::new("Too Many Requests").with_retry_after("8");
        assert_eq!(
            classify_error(&err),
            AttemptOutcome::RateLimited {
                wait_seconds: Some(8.0),
                matched_pattern: "too many requests".into(),
            }
        );
    }

    #[test]
    fn test_rate_limited_without_timing() {
        let err = ProviderError::new("quota exceeded");
        assert_eq!(
            classify_error(&err),
            AttemptOutcome::RateLimited {
                wait_seconds: None,
                matched_pattern: "quota exceeded".into(),
            }
        );
    }

    #[test]
    fn test_invalid_key_message() {
        let err = ProviderError::new("API key not valid. Please pass a valid API key.")
            .with_status(400);
        assert_eq!(classify_error(&err), AttemptOutcome::InvalidCredential);
    }

    #[test]
    fn test_invalid_key_reason_in_body() {
        let err = ProviderError::new("provider returned 400")
            .with_status(400)
            .with_body(r#"{"error":{"details":[{"reason":"API_KEY_INVALID"}]}}"#);
        assert!(is_invalid_credential(&err));
        assert_eq!(classify_error(&err), AttemptOutcome::InvalidCredential);
    }

    #[test]
    fn test_rate_limit_checked_before_invalid_key() {
        let err = ProviderError::new("api_key_invalid").with_status(429);
        assert!(matches!(
            classify_error(&err),
            AttemptOutcome::RateLimited { matched_pattern, .. } if matched_pattern == "status 429"
        ));
    }

    #[test]
    fn test_other_errors_are_fatal() {
        let err = ProviderError::new("provider returned 500 Internal Server Error").with_status(500);
        assert_eq!(
            classify_error(&err),
            AttemptOutcome::Fatal {
                message: "provider returned 500 Internal Server Error".into()
            }
        );
    }
}
