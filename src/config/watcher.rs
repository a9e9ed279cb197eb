//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_settings;
use crate::config::schema::ProxySettings;

/// A watcher that monitors the configuration file for changes.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by renaming a temporary file over the original keep
/// triggering reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxySettings>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for settings snapshots.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxySettings>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Sender feeding the same channel, for other reload triggers (SIGHUP).
    pub fn sender(&self) -> mpsc::UnboundedSender<ProxySettings> {
        self.update_tx.clone()
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let file_name = self.path.file_name().map(ToOwned::to_owned);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::info!(path = ?path, "Config file changed");
                        reload(&path, &tx);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load the file and hand the snapshot to the supervisor.
///
/// Load failures are logged and the current configuration stays in place.
pub fn reload(path: &Path, tx: &mpsc::UnboundedSender<ProxySettings>) {
    match load_settings(path) {
        Ok(settings) => {
            if tx.send(settings).is_err() {
                tracing::debug!("Supervisor gone, dropping config snapshot");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to reload config. Keeping current configuration.");
        }
    }
}
