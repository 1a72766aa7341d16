//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Randomize each delay within [delay / 2, delay]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

/// Settings shared by every coordinator operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Chain the multisig accounts live on; part of the proposal hash
    pub chain_id: u64,
    /// Timeout for a single relay, signer or account call
    pub call_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Block explorer base URL used to log links to executions
    pub explorer_url: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            call_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
            explorer_url: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Explorer link for an execution receipt, if an explorer is configured
    pub fn explorer_link(&self, receipt_id: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), receipt_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(60), Duration::from_millis(1_000));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{"chain_id": 5, "retry": {"max_attempts": 2}}"#).unwrap();
        assert_eq!(config.chain_id, 5);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.initial_backoff_ms, 200);
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_explorer_link() {
        let config = CoordinatorConfig {
            explorer_url: Some("https://goerli.etherscan.io/".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.explorer_link("0xabc").as_deref(),
            Some("https://goerli.etherscan.io/tx/0xabc")
        );
        assert_eq!(CoordinatorConfig::default().explorer_link("0xabc"), None);
    }
}
