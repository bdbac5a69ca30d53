//! Retry with exponential backoff for transient provider failures.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cancel::CancelToken;
use crate::consts::{DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY};
use crate::provider::{Operation, ProviderError};
use crate::resource::ResourceAddress;

use super::types::ReconcileError;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
  /// Total attempts including the first.
  pub max_attempts: u32,
  pub initial_delay: Duration,
  pub max_delay: Duration,
  pub multiplier: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: DEFAULT_MAX_ATTEMPTS,
      initial_delay: DEFAULT_INITIAL_DELAY,
      max_delay: DEFAULT_MAX_DELAY,
      multiplier: DEFAULT_BACKOFF_MULTIPLIER,
    }
  }
}

impl RetryPolicy {
  /// A policy that never retries.
  pub fn none() -> Self {
    Self {
      max_attempts: 1,
      ..Self::default()
    }
  }

  /// Delay to wait after failed attempt `attempt` (1-based).
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32) as i32;
    let factor = self.multiplier.max(1.0).powi(exponent);
    let delay = self.initial_delay.as_secs_f64() * factor;

    if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
      self.max_delay
    } else {
      Duration::from_secs_f64(delay)
    }
  }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// Returns the value with the number of attempts used. Backoff sleeps are
/// interrupted by cancellation; a call already in flight is always awaited.
pub(crate) async fn with_retry<T, F, Fut>(
  policy: &RetryPolicy,
  cancel: &CancelToken,
  address: &ResourceAddress,
  operation: Operation,
  mut op: F,
) -> Result<(T, u32), ReconcileError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, ProviderError>>,
{
  let max_attempts = policy.max_attempts.max(1);
  let mut attempt = 0;

  loop {
    attempt += 1;

    match op().await {
      Ok(value) => return Ok((value, attempt)),
      Err(e) if e.is_transient() && attempt < max_attempts => {
        let delay = policy.delay_for(attempt);
        warn!(
          resource = %address,
          operation = %operation,
          attempt,
          delay_ms = delay.as_millis() as u64,
          error = %e,
          "transient failure, retrying"
        );

        if !cancel.sleep(delay).await {
          return Err(ReconcileError::Cancelled);
        }
      }
      Err(source) => {
        return Err(ReconcileError::Provider {
          resource: address.clone(),
          operation,
          attempts: attempt,
          source,
        });
      }
    }
  }
}
