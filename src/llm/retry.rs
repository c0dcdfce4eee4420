//! Bounded retry with exponential backoff for transient provider failures.

use std::time::Duration;

use tracing::warn;

use crate::config::Settings;
use crate::llm::client::LlmProvider;
use crate::EnrichError;

/// Longest wait a provider's `Retry-After` hint can impose on one retry.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_retries: settings.pipeline.max_retries,
            initial_backoff: Duration::from_millis(settings.pipeline.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.pipeline.max_backoff_ms),
        }
    }

    /// No waiting between attempts
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }

    /// Delay before retry number `retry`, stretched to honour a server hint
    /// up to [`MAX_RETRY_AFTER`].
    pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.backoff(retry);
        match hint {
            Some(hint) => backoff.max(hint.min(MAX_RETRY_AFTER)),
            None => backoff,
        }
    }
}

/// Call the provider, retrying rate limits and timeouts within the policy.
///
/// Once the budget is spent the last transient error becomes
/// [`EnrichError::EnrichmentFailed`], which only affects the current record.
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    prompt: &str,
    policy: &RetryPolicy,
) -> crate::Result<String> {
    let mut retry = 0u32;
    loop {
        match provider.complete(prompt).await {
            Ok(text) => return Ok(text),
            Err(err) if err.is_retryable() && retry < policy.max_retries => {
                retry += 1;
                let hint = match &err {
                    EnrichError::RateLimited { retry_after } => *retry_after,
                    _ => None,
                };
                let delay = policy.delay_for(retry, hint);
                warn!(
                    "{} call failed ({}), retry {}/{} in {:?}",
                    provider.name(),
                    err,
                    retry,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_retryable() => {
                return Err(EnrichError::EnrichmentFailed(format!(
                    "giving up after {} attempts: {}",
                    retry + 1,
                    err
                )));
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<crate::Result<String>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(replies: Vec<crate::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> crate::Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("{}".to_string()))
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(10), Duration::from_secs(8));
    }

    #[test]
    fn server_hint_stretches_delay_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(500));
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            policy.delay_for(4, Some(Duration::from_millis(10))),
            Duration::from_secs(4)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(86_400 * 365))),
            MAX_RETRY_AFTER
        );
    }

    #[test]
    fn recovers_from_rate_limit_within_budget() {
        let provider = Scripted::new(vec![
            Err(EnrichError::RateLimited { retry_after: None }),
            Err(EnrichError::Timeout),
            Ok("done".to_string()),
        ]);

        let reply = tokio_test::block_on(complete_with_retry(
            &provider,
            "prompt",
            &RetryPolicy::immediate(3),
        ))
        .unwrap();
        assert_eq!(reply, "done");
        assert_eq!(provider.calls(), 3);
    }

    #[test]
    fn exhausted_budget_degrades_to_enrichment_failed() {
        let provider = Scripted::new(vec![
            Err(EnrichError::Timeout),
            Err(EnrichError::Timeout),
            Err(EnrichError::Timeout),
        ]);

        let err = tokio_test::block_on(complete_with_retry(
            &provider,
            "prompt",
            &RetryPolicy::immediate(2),
        ))
        .unwrap_err();
        assert!(matches!(err, EnrichError::EnrichmentFailed(_)));
        assert!(!err.is_fatal());
        assert_eq!(provider.calls(), 3);
    }

    #[test]
    fn auth_errors_are_not_retried() {
        let provider = Scripted::new(vec![Err(EnrichError::Auth("bad key".to_string()))]);

        let err = tokio_test::block_on(complete_with_retry(
            &provider,
            "prompt",
            &RetryPolicy::immediate(3),
        ))
        .unwrap_err();
        assert!(matches!(err, EnrichError::Auth(_)));
        assert_eq!(provider.calls(), 1);
    }
}
