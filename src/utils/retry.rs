//! Exponential backoff for transient failures.
//!
//! The executor is generic over the error type; callers pass the predicate
//! that decides which failures are worth another attempt. Two predicates ship
//! with the crate: [`is_transient_channel_error`] for the messaging channel
//! and [`crate::utils::http::is_transient_transport`] for plain HTTP calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::plugins::traits::{MessageChannel, MessageReceipt, RecipientId};
use crate::utils::error::ChannelError;

/// Lets an error carry a server-supplied wait time that overrides backoff.
pub trait RetryHint {
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl RetryHint for ChannelError {
    fn retry_after(&self) -> Option<Duration> {
        match self {
            ChannelError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl RetryHint for reqwest::Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// Backoff before retrying after the 0-indexed `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Runs `operation` up to `max_retries + 1` times.
///
/// Only failures accepted by `is_retryable` are retried; anything else is
/// returned immediately. Exhaustion returns the last failure.
pub async fn retry_with_backoff<T, E, Op, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: RetryHint + Display,
{
    let total = policy.total_attempts();
    let mut attempt: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }

        if attempt >= policy.max_retries {
            error!("All {} attempts failed. Last error: {}", total, err);
            return Err(err);
        }

        let delay = match err.retry_after() {
            Some(hint) => {
                warn!(
                    "Rate limited, waiting {:?} (attempt {}/{})",
                    hint,
                    attempt + 1,
                    total
                );
                hint
            }
            None => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Transient error: {}. Retrying in {:?} (attempt {}/{})",
                    err,
                    delay,
                    attempt + 1,
                    total
                );
                delay
            }
        };

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Network, timeout, rate-limit and server-side failures are worth retrying.
pub fn is_transient_channel_error(err: &ChannelError) -> bool {
    matches!(
        err,
        ChannelError::Network(_)
            | ChannelError::Timeout
            | ChannelError::RateLimited { .. }
            | ChannelError::Server { .. }
    )
}

/// Delivers one message, converting every failure into `None`.
pub async fn send_message_with_retry(
    channel: &dyn MessageChannel,
    recipient: RecipientId,
    text: &str,
    policy: &RetryPolicy,
) -> Option<MessageReceipt> {
    let result = retry_with_backoff(policy, is_transient_channel_error, || {
        channel.send_message(recipient, text)
    })
    .await;

    match result {
        Ok(receipt) => Some(receipt),
        Err(err) if is_transient_channel_error(&err) => {
            error!(
                recipient,
                kind = err.kind(),
                "Failed to send message after retries: {}",
                err
            );
            None
        }
        Err(err) => {
            warn!(
                recipient,
                kind = err.kind(),
                "Permanent error sending message: {}",
                err
            );
            None
        }
    }
}
