//! Online/offline tracking.
//!
//! The flag lives in a `watch` channel so any number of tasks can wait for
//! a transition. A probe task keeps it current by polling the backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::ChatApi;

#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns `true` if this call changed the state.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Poll `api` every `interval` and feed the result into the monitor.
    ///
    /// Any HTTP response counts as online, a transport error as offline.
    pub fn spawn_probe(&self, api: Arc<dyn ChatApi>, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let online = match api.probe().await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::trace!(error = %e, "probe failed");
                        false
                    }
                };
                monitor.set_online(online);
            }
        })
    }
}
