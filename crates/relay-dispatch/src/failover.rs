//! Ordered credential failover for one generation request.
//!
//! Credentials are tried strictly in pool order, one at a time. The first
//! non-empty response wins. Rate-limited credentials contribute a wait to an
//! accumulator, invalid ones are skipped, and any other failure aborts the
//! dispatch. When the pool is exhausted by rate limits alone, the shortest
//! accumulated wait (plus a buffer) is reported to the caller.

use relay_config::{CredentialPool, DispatchConfig};
use relay_core::DispatchResult;
use tracing::{Instrument, debug, error, info, info_span, warn};
use ulid::Ulid;

use crate::classify::{AttemptOutcome, classify_attempt};
use crate::client::ModelClient;

pub const NO_CREDENTIALS_MESSAGE: &str = "No credentials configured";
pub const ALL_EXHAUSTED_MESSAGE: &str = "Failed to generate with all credentials";

/// Timing knobs for aggregating rate-limit waits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchPolicy {
    /// Recorded for a rate-limited credential with no parseable timing.
    pub default_retry_secs: f64,
    /// Added to the shortest wait to absorb clock skew.
    pub retry_buffer_secs: f64,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        DispatchConfig::default().into()
    }
}

impl From<&DispatchConfig> for DispatchPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            default_retry_secs: config.default_retry_secs,
            retry_buffer_secs: config.retry_buffer_secs,
        }
    }
}

impl From<DispatchConfig> for DispatchPolicy {
    fn from(config: DispatchConfig) -> Self {
        Self::from(&config)
    }
}

/// Stateless across calls apart from the read-only pool, so one instance can
/// serve concurrent requests behind an `Arc`.
pub struct Dispatcher<C> {
    pool: CredentialPool,
    client: C,
    policy: DispatchPolicy,
}

impl<C: ModelClient> Dispatcher<C> {
    pub fn new(pool: CredentialPool, client: C, policy: DispatchPolicy) -> Self {
        Self {
            pool,
            client,
            policy,
        }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Run one logical generation, failing over across the pool.
    pub async fn dispatch(&self, prompt: &str) -> DispatchResult {
        let request_id = Ulid::new();
        let span = info_span!("dispatch", %request_id, credentials = self.pool.len());
        self.dispatch_inner(prompt).instrument(span).await
    }

    async fn dispatch_inner(&self, prompt: &str) -> DispatchResult {
        if self.pool.is_empty() {
            error!("Dispatch attempted with an empty credential pool");
            return DispatchResult::error(NO_CREDENTIALS_MESSAGE);
        }

        let mut waits: Vec<f64> = Vec::new();

        for credential in self.pool.iter() {
            let label = credential.label();
            debug!(credential = %label, "Trying credential");

            match classify_attempt(self.client.generate(credential, prompt).await) {
                AttemptOutcome::Success { text } => {
                    info!(credential = %label, chars = text.len(), "Generation succeeded");
                    return DispatchResult::Ok { text };
                }
                AttemptOutcome::RateLimited {
                    wait_seconds,
                    matched_pattern,
                } => {
                    let wait = wait_seconds.unwrap_or(self.policy.default_retry_secs);
                    warn!(
                        credential = %label,
                        pattern = %matched_pattern,
                        wait_secs = wait,
                        extracted = wait_seconds.is_some(),
                        "Credential rate-limited, failing over"
                    );
                    waits.push(wait);
                }
                AttemptOutcome::InvalidCredential => {
                    warn!(credential = %label, "Credential rejected, failing over");
                }
                AttemptOutcome::Fatal { message } => {
                    error!(credential = %label, error = %message, "Non-retryable provider error");
                    return DispatchResult::error(message);
                }
            }
        }

        match aggregate_retry_after(&waits, self.policy.retry_buffer_secs) {
            Some(retry_after) => {
                warn!(
                    limited = waits.len(),
                    retry_after_secs = retry_after,
                    "All credentials rate-limited"
                );
                DispatchResult::all_limited(retry_after)
            }
            None => {
                error!("No credential accepted the request");
                DispatchResult::error(ALL_EXHAUSTED_MESSAGE)
            }
        }
    }
}

/// `max(1, ceil(min(waits) + buffer))`, or None when nothing was limited.
///
/// The soonest-recovering credential decides when a retry is worth making.
pub fn aggregate_retry_after(waits: &[f64], buffer_secs: f64) -> Option<u64> {
    let shortest = waits.iter().copied().reduce(f64::min)?;
    let seconds = (shortest + buffer_secs).ceil().max(1.0);
    Some(seconds as u64)
}

#[cfg(test)]
#[path = "failover_tests.rs"]
mod tests;
