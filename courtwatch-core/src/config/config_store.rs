//! Hot-swappable configuration with change notification.
//!
//! The server reloads its TOML file on SIGHUP and pushes the new values into
//! a [`ConfigStore`]; long-running processors hold a [`ConfigWatcher`] and
//! pick the new values up between units of work.

use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// A shared configuration value with a version counter.
pub struct ConfigStore<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    data: RwLock<T>,
    version_tx: watch::Sender<u64>,
}

/// Waits for updates of a [`ConfigStore`].
pub struct ConfigWatcher {
    version_rx: watch::Receiver<u64>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(initial),
                version_tx,
            }),
        }
    }

    /// Replace the stored value and wake every watcher.
    pub async fn update(&self, value: T) {
        *self.inner.data.write().await = value;
        // The write guard is released above, so woken watchers can read.
        self.inner.version_tx.send_modify(|version| *version += 1);
    }

    /// Number of updates applied since creation.
    pub fn version(&self) -> u64 {
        *self.inner.version_tx.borrow()
    }

    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }
}

impl<T: Clone> ConfigStore<T> {
    /// Clone out the current value.
    pub async fn snapshot(&self) -> T {
        self.inner.data.read().await.clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConfigWatcher {
    /// Wait until the store is updated.
    ///
    /// Returns `Err` once the [`ConfigStore`] has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }
}
