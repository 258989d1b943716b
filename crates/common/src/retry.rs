//! Bounded retry with fixed backoff
//!
//! Adapters opt in by wrapping transient venue calls. Only errors whose code
//! is whitelisted in [`RetryConfig::retry_codes`] are retried; engines never
//! retry on their own.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tessera_ports::ClientError;

use crate::error::RetryError;

/// Errors that expose a stable code for whitelist matching
pub trait RetryableError: std::fmt::Display {
    fn error_code(&self) -> &str;
}

impl RetryableError for ClientError {
    fn error_code(&self) -> &str {
        match self {
            ClientError::NotConnected(_) => "not_connected",
            ClientError::Unsupported(_) => "unsupported",
            ClientError::Rejected(_) => "rejected",
            ClientError::Transport(_) => "transport",
            ClientError::ChannelClosed => "channel_closed",
            ClientError::ChannelFull => "channel_full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub delay_ms: u64,
    /// Error codes that may be retried
    pub retry_codes: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 500,
            retry_codes: vec!["transport".to_string(), "channel_full".to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn is_retryable<E: RetryableError>(&self, error: &E) -> bool {
        self.config
            .retry_codes
            .iter()
            .any(|code| code == error.error_code())
    }

    /// Run `op` until it succeeds, fails with a non-whitelisted error, or
    /// `max_retries` retries are spent
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: RetryableError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let delay = Duration::from_millis(self.config.delay_ms);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.is_retryable(&error) {
                log::error!(
                    "Operation failed: operation={operation}, code={}, error={error}",
                    error.error_code()
                );
                return Err(RetryError::NonRetryable {
                    operation: operation.to_string(),
                    error,
                });
            }
            if attempts > self.config.max_retries {
                log::error!(
                    "Retries exhausted: operation={operation}, attempts={attempts}, error={error}"
                );
                return Err(RetryError::Exhausted {
                    operation: operation.to_string(),
                    attempts,
                    last: error,
                });
            }

            log::warn!(
                "Retrying operation: operation={operation}, attempt={attempts}, delay_ms={}, error={error}",
                self.config.delay_ms
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
