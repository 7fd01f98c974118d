//! Dispatcher: ordered credential failover, rate-limit classification and
//! retry-timing extraction for calls to the generative model provider.

pub mod classify;
pub mod client;
pub mod failover;
pub mod gemini;
pub mod rate_limit;
pub mod retry_delay;

pub use classify::{
    AttemptOutcome, EMPTY_RESPONSE_MESSAGE, classify_attempt, classify_error, is_invalid_credential,
};
pub use client::{ModelClient, ProviderError};
pub use failover::{
    ALL_EXHAUSTED_MESSAGE, DispatchPolicy, Dispatcher, NO_CREDENTIALS_MESSAGE,
    aggregate_retry_after,
};
pub use gemini::GeminiClient;
pub use rate_limit::{RateLimitDetected, detect_rate_limit};
pub use retry_delay::{extract_retry_delay_seconds, parse_retry_after_header};
