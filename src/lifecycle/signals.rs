//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or SIGTERM
//! - Re-read the config file on SIGHUP

#[cfg(unix)]
use std::path::PathBuf;

#[cfg(unix)]
use tokio::sync::mpsc;
#[cfg(unix)]
use tokio::task::JoinHandle;

#[cfg(unix)]
use crate::config::{watcher::reload, ProxySettings};

/// Resolve on the first termination signal.
pub async fn termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}

/// Reload the config file whenever SIGHUP arrives.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(
    path: PathBuf,
    tx: mpsc::UnboundedSender<ProxySettings>,
) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            if tx.is_closed() {
                break;
            }
            tracing::info!(path = ?path, "SIGHUP received, reloading configuration");
            reload(&path, &tx);
        }
    }))
}
