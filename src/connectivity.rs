//! Explicitly-owned connectivity state shared by the dispatcher and the
//! sync coordinator.
//!
//! There is no dedicated heartbeat: every successful network call marks the
//! state online and every transport-level failure marks it offline, so call
//! outcomes alone keep this accurate even when no platform connectivity
//! signal is wired up.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::info;

/// Process-wide connectivity, two values only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
  Online,
  Offline,
}

impl std::fmt::Display for ConnectivityState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Online => write!(f, "online"),
      Self::Offline => write!(f, "offline"),
    }
  }
}

/// Shared connectivity flag with an offline-to-online edge signal.
///
/// Transitions are idempotent; only the offline-to-online edge wakes
/// whoever is waiting in [`Connectivity::wait_restored`].
pub struct Connectivity {
  online: AtomicBool,
  restored: Notify,
}

impl Connectivity {
  pub fn new(initially_online: bool) -> Self {
    Self {
      online: AtomicBool::new(initially_online),
      restored: Notify::new(),
    }
  }

  pub fn state(&self) -> ConnectivityState {
    if self.is_online() {
      ConnectivityState::Online
    } else {
      ConnectivityState::Offline
    }
  }

  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::Acquire)
  }

  /// Transition to online. Fires the restored signal on the edge.
  pub fn mark_online(&self) {
    if !self.online.swap(true, Ordering::AcqRel) {
      info!("connectivity restored");
      self.restored.notify_one();
    }
  }

  /// Transition to offline.
  pub fn mark_offline(&self) {
    if self.online.swap(false, Ordering::AcqRel) {
      info!("connectivity lost");
    }
  }

  /// Wait for the next offline-to-online transition.
  pub async fn wait_restored(&self) {
    self.restored.notified().await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Duration;

  #[test]
  fn test_transitions() {
    let conn = Connectivity::new(true);
    assert_eq!(conn.state(), ConnectivityState::Online);

    conn.mark_offline();
    assert_eq!(conn.state(), ConnectivityState::Offline);

    // Idempotent
    conn.mark_offline();
    assert!(!conn.is_online());

    conn.mark_online();
    assert!(conn.is_online());
  }

  #[tokio::test]
  async fn test_restored_edge_wakes_waiter() {
    let conn = Arc::new(Connectivity::new(false));
    let waiter = Arc::clone(&conn);

    let handle = tokio::spawn(async move {
      waiter.wait_restored().await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    conn.mark_online();

    tokio::time::timeout(Duration::from_secs(1), handle)
      .await
      .expect("waiter should wake on restore")
      .unwrap();
  }

  #[tokio::test]
  async fn test_restore_before_wait_is_not_lost() {
    let conn = Connectivity::new(false);
    conn.mark_online();

    // The permit stored by notify_one lets a later waiter proceed.
    tokio::time::timeout(Duration::from_millis(100), conn.wait_restored())
      .await
      .expect("stored permit should satisfy the wait");
  }
}
