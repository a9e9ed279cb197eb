//! Startup orchestration.
//!
//! # Responsibilities
//! - Locate, load and validate configuration
//! - Start the first engine
//! - Start the reload triggers (file watcher, SIGHUP)
//! - Run the supervisor until a termination signal
//!
//! # Design Decisions
//! - Fail fast: configuration and bind errors at startup are fatal
//! - Reload triggers are best effort; failing to start one is logged only

use std::path::PathBuf;
use std::time::Duration;

use crate::config::watcher::ConfigWatcher;
use crate::config::{load_settings, locate_config};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::lifecycle::supervisor::{LifecycleError, Supervisor, DEFAULT_DRAIN_TIMEOUT};
use crate::net::connection::DrainOutcome;

/// Options collected from the command line.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    /// Explicit config file; searched for when absent.
    pub config_path: Option<PathBuf>,
    pub drain_timeout: Duration,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Run the proxy until SIGINT or SIGTERM.
pub async fn run(options: StartupOptions) -> Result<DrainOutcome, LifecycleError> {
    let path = locate_config(options.config_path.as_deref())?;
    tracing::info!(path = ?path, "Using config file");

    let settings = load_settings(&path)?;
    let supervisor = Supervisor::start(&settings, options.drain_timeout).await?;

    let config = supervisor.config();
    tracing::info!(
        upstream = %config.upstream,
        bind = %config.bind,
        address = %supervisor.local_addr(),
        drain_timeout = ?options.drain_timeout,
        "mini-auth-proxy started"
    );

    let (watcher, updates) = ConfigWatcher::new(&path);

    #[cfg(unix)]
    let hangup = match signals::spawn_reload_on_hangup(path.clone(), watcher.sender()) {
        Ok(task) => Some(task),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGHUP handler");
            None
        }
    };

    // Keeps the notify watcher alive for the lifetime of the supervisor.
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, path = ?path, "Config watching disabled");
            None
        }
    };

    let shutdown = Shutdown::new();
    let stopped = shutdown.notified();
    tokio::spawn(async move {
        signals::termination().await;
        shutdown.trigger();
    });

    let outcome = supervisor.run(updates, stopped).await;

    #[cfg(unix)]
    if let Some(task) = hangup {
        task.abort();
    }

    Ok(outcome)
}
