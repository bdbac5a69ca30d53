use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::consts::{DEFAULT_POLL_INTERVAL, DEFAULT_STABILIZE_TIMEOUT};
use crate::provider::{LiveState, Operation, Provider};

use super::types::ReconcileError;

/// Bounded polling of a resource's readiness signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizeConfig {
  pub poll_interval: Duration,
  pub timeout: Duration,
}

impl Default for StabilizeConfig {
  fn default() -> Self {
    Self {
      poll_interval: DEFAULT_POLL_INTERVAL,
      timeout: DEFAULT_STABILIZE_TIMEOUT,
    }
  }
}

/// Poll `is_stable` until it reports true.
///
/// Transient poll failures count as "not yet". Returns the number of polls.
pub(crate) async fn wait_until_stable(
  provider: &dyn Provider,
  live: &LiveState,
  config: &StabilizeConfig,
  cancel: &CancelToken,
) -> Result<u32, ReconcileError> {
  let started = Instant::now();
  let mut polls = 0;

  loop {
    polls += 1;

    match provider.is_stable(live).await {
      Ok(true) => {
        debug!(resource = %live.address, polls, "resource stable");
        return Ok(polls);
      }
      Ok(false) => {}
      Err(e) if e.is_transient() => {
        warn!(resource = %live.address, polls, error = %e, "stability check failed, polling again");
      }
      Err(source) => {
        return Err(ReconcileError::Provider {
          resource: live.address.clone(),
          operation: Operation::IsStable,
          attempts: polls,
          source,
        });
      }
    }

    let elapsed = started.elapsed();
    if elapsed >= config.timeout {
      return Err(ReconcileError::StabilizationTimeout {
        resource: live.address.clone(),
        waited: elapsed,
      });
    }

    debug!(resource = %live.address, polls, "waiting for resource to stabilize");
    let wait = config.poll_interval.min(config.timeout - elapsed);
    if !cancel.sleep(wait).await {
      return Err(ReconcileError::Cancelled);
    }
  }
}
