//! Cooperative cancellation.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A cloneable cancellation flag.
///
/// Cancellation is checked between operations and interrupts waits, but never
/// aborts an operation already handed to a provider. Once cancelled, a token
/// stays cancelled. Cancelling a token also cancels every token derived from
/// it with [`CancelToken::child_token`], never the other way round.
#[derive(Debug, Clone)]
pub struct CancelToken {
  inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
  tx: watch::Sender<bool>,
  children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
  fn cancel(&self) {
    if self.tx.send_replace(true) {
      return;
    }
    let children = std::mem::take(&mut *self.children.lock().unwrap_or_else(PoisonError::into_inner));
    for child in children.iter().filter_map(Weak::upgrade) {
      child.cancel();
    }
  }
}

impl Default for CancelToken {
  fn default() -> Self {
    Self::new()
  }
}

impl CancelToken {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(false);
    Self {
      inner: Arc::new(Inner {
        tx,
        children: Mutex::new(Vec::new()),
      }),
    }
  }

  /// A new token that is cancelled along with this one but can also be
  /// cancelled on its own.
  pub fn child_token(&self) -> CancelToken {
    let child = CancelToken::new();
    let mut children = self.inner.children.lock().unwrap_or_else(PoisonError::into_inner);
    if self.is_cancelled() {
      child.cancel();
    } else {
      children.retain(|c| c.strong_count() > 0);
      children.push(Arc::downgrade(&child.inner));
    }
    child
  }

  pub fn cancel(&self) {
    self.inner.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    *self.inner.tx.borrow()
  }

  /// Resolves once the token is cancelled.
  pub async fn cancelled(&self) {
    let mut rx = self.inner.tx.subscribe();
    // The sender lives as long as `self`, so this only returns on cancel.
    let _ = rx.wait_for(|cancelled| *cancelled).await;
  }

  /// Sleep for `duration`, returning false if cancelled first.
  pub async fn sleep(&self, duration: Duration) -> bool {
    tokio::select! {
      _ = tokio::time::sleep(duration) => true,
      _ = self.cancelled() => false,
    }
  }

  /// Cancel this token after `timeout` unless it is cancelled sooner.
  ///
  /// Abort the returned handle to disarm the timer.
  pub fn cancel_after(&self, timeout: Duration) -> JoinHandle<bool> {
    let token = self.clone();
    tokio::spawn(async move {
      if token.sleep(timeout).await {
        token.cancel();
        true
      } else {
        false
      }
    })
  }
}
