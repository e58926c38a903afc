use std::sync::Arc;

use tokio::sync::watch;

/// Process-wide "is the device online" flag.
///
/// Clones share the same underlying state. Writes come from the redirect
/// interceptor's load-failure classification; everything else only reads or
/// subscribes.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    /// Start out assuming the device is online.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receive a notification on every change of the flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub(crate) fn mark_offline(&self) {
        self.set(false);
    }

    pub(crate) fn mark_online(&self) {
        self.set(true);
    }

    fn set(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                tracing::info!("Connectivity restored");
            } else {
                tracing::warn!("Connectivity lost");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_online() {
        assert!(ConnectivityMonitor::new().is_online());
    }

    #[test]
    fn clones_share_state() {
        let a = ConnectivityMonitor::new();
        let b = a.clone();
        a.mark_offline();
        assert!(!b.is_online());
        b.mark_online();
        assert!(a.is_online());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let monitor = ConnectivityMonitor::new();
        let mut rx = monitor.subscribe();
        monitor.mark_offline();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }

    #[test]
    fn repeated_writes_do_not_notify() {
        let monitor = ConnectivityMonitor::new();
        let rx = monitor.subscribe();
        monitor.mark_online();
        assert!(!rx.has_changed().unwrap());
    }
}
