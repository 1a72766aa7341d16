//! Bounded retries with timeouts and cancellation

use crate::coordinator::config::RetryPolicy;
use crate::coordinator::error::CoordinatorError;
use crate::core::Address;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Which collaborator a call goes to; decides what a timeout turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Relay,
    Account,
    Signer(Address),
}

impl Call {
    fn timed_out(self, after: Duration) -> CoordinatorError {
        let detail = format!("no response after {:?}", after);
        match self {
            Call::Relay => CoordinatorError::RelayUnavailable(detail),
            Call::Account => CoordinatorError::ExecutionUnavailable(detail),
            Call::Signer(signer) => CoordinatorError::SignerUnavailable {
                signer,
                reason: detail,
            },
        }
    }
}

/// Runs calls under one retry policy, timeout and cancellation token
pub struct Retrier<'a> {
    policy: &'a RetryPolicy,
    call_timeout: Duration,
    cancel: &'a CancellationToken,
}

impl<'a> Retrier<'a> {
    pub fn new(policy: &'a RetryPolicy, call_timeout: Duration, cancel: &'a CancellationToken) -> Self {
        Self {
            policy,
            call_timeout,
            cancel,
        }
    }

    /// Run `op` until it succeeds, fails permanently or attempts run out
    pub async fn run<T, E, F, Fut>(&self, call: Call, what: &str, mut op: F) -> Result<T, CoordinatorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<CoordinatorError>,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.once(call, op()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= attempts {
                log::warn!("{} failed after {} attempts: {}", what, attempts, err);
                return Err(err);
            }

            let delay = self.delay(attempt);
            log::warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                what,
                attempt,
                attempts,
                err,
                delay
            );
            self.pause(delay).await?;
            attempt += 1;
        }
    }

    /// A single attempt bounded by the call timeout
    pub async fn once<T, E, Fut>(&self, call: Call, fut: Fut) -> Result<T, CoordinatorError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<CoordinatorError>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CoordinatorError::Cancelled),
            result = timeout(self.call_timeout, fut) => match result {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(call.timed_out(self.call_timeout)),
            },
        }
    }

    /// Sleep unless cancelled first
    pub async fn pause(&self, delay: Duration) -> Result<(), CoordinatorError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CoordinatorError::Cancelled),
            _ = sleep(delay) => Ok(()),
        }
    }

    pub fn check_cancelled(&self) -> Result<(), CoordinatorError> {
        if self.cancel.is_cancelled() {
            return Err(CoordinatorError::Cancelled);
        }
        Ok(())
    }

    /// Backoff before retry number `retry`, jittered if configured
    pub fn delay(&self, retry: u32) -> Duration {
        let cap = self.policy.backoff(retry);
        if !self.policy.jitter || cap.is_zero() {
            return cap;
        }
        let ms = cap.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(ms / 2..=ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            jitter: true,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let policy = fast_policy(4);
        let cancel = CancellationToken::new();
        let retrier = Retrier::new(&policy, Duration::from_secs(1), &cancel);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = retrier
            .run(Call::Relay, "fetch", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RelayError::Unavailable("503".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let policy = fast_policy(4);
        let cancel = CancellationToken::new();
        let retrier = Retrier::new(&policy, Duration::from_secs(1), &cancel);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = retrier
            .run(Call::Relay, "confirm", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RelayError::Rejected("mismatched endorsement".into()))
            })
            .await;

        assert!(matches!(result, Err(CoordinatorError::RelayRejected(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let policy = fast_policy(3);
        let cancel = CancellationToken::new();
        let retrier = Retrier::new(&policy, Duration::from_secs(1), &cancel);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = retrier
            .run(Call::Relay, "propose", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RelayError::Unavailable("connection refused".into()))
            })
            .await;

        assert_eq!(
            result,
            Err(CoordinatorError::RelayUnavailable("connection refused".into()))
        );
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let policy = fast_policy(2);
        let cancel = CancellationToken::new();
        let retrier = Retrier::new(&policy, Duration::from_millis(10), &cancel);
        let signer = Address::repeat_byte(4);

        let result: Result<(), CoordinatorError> = retrier
            .run(Call::Signer(signer), "sign", || async {
                sleep(Duration::from_secs(5)).await;
                Ok::<(), CoordinatorError>(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, CoordinatorError::SignerUnavailable { signer: s, .. } if s == signer));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let policy = fast_policy(2);
        let cancel = CancellationToken::new();
        let retrier = Retrier::new(&policy, Duration::from_secs(5), &cancel);

        let token = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result: Result<(), CoordinatorError> = retrier
            .run(Call::Relay, "fetch", || async {
                sleep(Duration::from_secs(5)).await;
                Ok::<(), CoordinatorError>(())
            })
            .await;
        assert_eq!(result, Err(CoordinatorError::Cancelled));
        assert_eq!(retrier.check_cancelled(), Err(CoordinatorError::Cancelled));
    }

    #[test]
    fn test_jittered_delay_within_bounds() {
        let policy = RetryPolicy {
            initial_backoff_ms: 100,
            max_backoff_ms: 400,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let retrier = Retrier::new(&policy, Duration::from_secs(1), &cancel);
        for retry in 1..6 {
            let delay = retrier.delay(retry);
            let cap = policy.backoff(retry);
            assert!(delay <= cap && delay >= cap / 2);
        }
    }
}
