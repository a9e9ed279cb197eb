//! Engine supervisor: start, hot-swap, drain, shut down.
//!
//! # States
//! ```text
//! Stopped → Starting → Running(E1)
//! Running(En) → [build En+1, obtain listener] → Running(En+1) + Draining(En) → Running(En+1)
//! Running(En) → ShuttingDown → Stopped
//! ```
//!
//! # Design Decisions
//! - The successor's listener exists before the predecessor stops accepting
//! - Same bind address: the bound socket is handed over, never re-bound
//! - A new address overlapping the current port is bound after the old
//!   socket is released; a brief gap in accepting is accepted
//! - A rejected change leaves the current engine serving
//! - Shutdown during a drain drains both engines under one deadline
//! - Snapshots queued during a swap coalesce to the latest

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{validate_settings, ConfigError, EngineConfig, ProxySettings};
use crate::http::server::{EngineError, ForwardingEngine, RunningEngine};
use crate::net::connection::{Connections, DrainOutcome};
use crate::net::listener::{Listener, ListenerError};

/// Grace period for in-flight requests when an engine is retired.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors starting or reconfiguring the proxy.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Where the supervisor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    Starting,
    Running,
    /// The current engine serves while the previous one drains.
    Draining,
    ShuttingDown,
}

/// Published view of the current engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub phase: Phase,
    /// Incremented on every successful swap; 1 is the startup engine.
    pub generation: u64,
    pub upstream: Option<String>,
    /// Configured bind address, before resolution.
    pub bind: Option<String>,
    pub local_addr: Option<SocketAddr>,
}

impl EngineStatus {
    fn stopped() -> Self {
        Self {
            phase: Phase::Stopped,
            generation: 0,
            upstream: None,
            bind: None,
            local_addr: None,
        }
    }
}

/// Result of applying a settings snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconfigured {
    /// A new engine is current; the previous one has been drained.
    Swapped {
        generation: u64,
        drain: DrainOutcome,
    },
    /// The snapshot matched the running configuration.
    Unchanged,
}

/// Owns the current engine and swaps it on reconfiguration.
pub struct Supervisor {
    current: RunningEngine,
    generation: u64,
    drain_timeout: Duration,
    status: Arc<ArcSwap<EngineStatus>>,
}

impl Supervisor {
    /// Build and bind the first engine. Any error here is fatal.
    pub async fn start(
        settings: &ProxySettings,
        drain_timeout: Duration,
    ) -> Result<Self, LifecycleError> {
        let status = Arc::new(ArcSwap::from_pointee(EngineStatus::stopped()));
        status.store(Arc::new(EngineStatus {
            phase: Phase::Starting,
            ..EngineStatus::stopped()
        }));

        let config = validate_settings(settings).map_err(ConfigError::Validation)?;
        let engine = ForwardingEngine::new(config)?;
        let listener = Listener::bind(&engine.config().bind).await?;

        let supervisor = Self {
            current: engine.serve(listener),
            generation: 1,
            drain_timeout,
            status,
        };
        supervisor.publish(Phase::Running);
        Ok(supervisor)
    }

    /// Snapshot of the current engine's status.
    pub fn status(&self) -> Arc<EngineStatus> {
        self.status.load_full()
    }

    /// Shared handle that always reflects the current engine.
    pub fn status_handle(&self) -> Arc<ArcSwap<EngineStatus>> {
        Arc::clone(&self.status)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.current.local_addr()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &EngineConfig {
        self.current.config()
    }

    fn publish(&self, phase: Phase) {
        self.status.store(Arc::new(EngineStatus {
            phase,
            generation: self.generation,
            upstream: Some(self.current.config().upstream.to_string()),
            bind: Some(self.current.config().bind.to_string()),
            local_addr: Some(self.current.local_addr()),
        }));
    }

    /// Replace the current engine with one built from `settings`.
    ///
    /// On error nothing changes: the current engine keeps serving.
    pub async fn reconfigure(
        &mut self,
        settings: &ProxySettings,
    ) -> Result<Reconfigured, LifecycleError> {
        let Some(previous) = self.swap(settings).await? else {
            return Ok(Reconfigured::Unchanged);
        };

        let drain = previous.drain(self.drain_timeout).await;
        self.finish_drain(drain);

        Ok(Reconfigured::Swapped {
            generation: self.generation,
            drain,
        })
    }

    /// Make an engine built from `settings` current and hand back the
    /// previous engine's in-flight connections. `None` if nothing changed.
    async fn swap(
        &mut self,
        settings: &ProxySettings,
    ) -> Result<Option<Connections>, LifecycleError> {
        let config = validate_settings(settings).map_err(ConfigError::Validation)?;
        if &config == self.current.config() {
            return Ok(None);
        }

        let engine = ForwardingEngine::new(config)?;

        let connections = match self.current.listener() {
            Some(listener) if engine.config().bind == self.current.config().bind => {
                // Same address: the successor takes over the bound socket.
                let connections = self.current.stop_accepting().await;
                drop(std::mem::replace(&mut self.current, engine.serve(listener)));
                connections
            }
            _ => match Listener::bind(&engine.config().bind).await {
                Ok(listener) => {
                    let mut previous =
                        std::mem::replace(&mut self.current, engine.serve(listener));
                    let connections = previous.stop_accepting().await;
                    // Closes the old socket before the drain starts.
                    drop(previous);
                    connections
                }
                Err(e)
                    if e.is_addr_in_use()
                        && engine.config().bind.port() == self.current.local_addr().port() =>
                {
                    self.rebind(engine, e).await?
                }
                Err(e) => return Err(e.into()),
            },
        };

        self.generation += 1;
        self.publish(Phase::Draining);
        tracing::info!(
            generation = self.generation,
            upstream = %self.current.config().upstream,
            address = %self.current.local_addr(),
            "Configuration applied, draining previous engine"
        );

        Ok(Some(connections))
    }

    /// The new address overlaps the port the current engine holds: release
    /// it and bind again. Connections arriving in between are refused.
    ///
    /// If the second bind fails too, the current engine goes back to its old
    /// address.
    async fn rebind(
        &mut self,
        engine: ForwardingEngine,
        conflict: ListenerError,
    ) -> Result<Connections, LifecycleError> {
        tracing::info!(
            from = %self.current.local_addr(),
            to = %engine.config().bind,
            error = %conflict,
            "Port held by the current listener, rebinding"
        );

        let connections = self.current.stop_accepting().await;
        self.current.close_listener();

        match Listener::bind(&engine.config().bind).await {
            Ok(listener) => {
                drop(std::mem::replace(&mut self.current, engine.serve(listener)));
                Ok(connections)
            }
            Err(e) => {
                let previous = self.current.local_addr();
                match Listener::bind_local(previous).await {
                    Ok(listener) => self.current.resume(listener),
                    Err(restore) => tracing::error!(
                        address = %previous,
                        error = %restore,
                        "Failed to restore previous listener, not accepting connections"
                    ),
                }

                // The current engine keeps its in-flight requests.
                let grace = self.drain_timeout;
                tokio::spawn(async move {
                    let outcome = connections.drain(grace).await;
                    log_drain(outcome, grace);
                });
                Err(e.into())
            }
        }
    }

    fn finish_drain(&self, outcome: DrainOutcome) {
        log_drain(outcome, self.drain_timeout);
        self.publish(Phase::Running);
    }

    /// Stop accepting, drain the current engine and stop.
    pub async fn shutdown(self) -> DrainOutcome {
        self.publish(Phase::ShuttingDown);
        tracing::info!("Shutting down, draining in-flight requests");

        let Self {
            mut current,
            drain_timeout,
            status,
            generation,
        } = self;

        let connections = current.stop_accepting().await;
        drop(current);

        let drain = connections.drain(drain_timeout).await;
        log_drain(drain, drain_timeout);

        status.store(Arc::new(EngineStatus {
            generation,
            ..EngineStatus::stopped()
        }));
        drain
    }

    /// Event loop: apply snapshots from `updates` until `shutdown` resolves.
    ///
    /// A shutdown during a drain does not wait for it: the previous and the
    /// current engine then drain side by side under one grace period.
    pub async fn run<F>(
        mut self,
        mut updates: mpsc::UnboundedReceiver<ProxySettings>,
        shutdown: F,
    ) -> DrainOutcome
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut updates_open = true;

        loop {
            let settings = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                update = updates.recv(), if updates_open => match update {
                    Some(settings) => coalesce(settings, &mut updates),
                    None => {
                        tracing::debug!("Config update channel closed");
                        updates_open = false;
                        continue;
                    }
                },
            };

            let previous = match self.swap(&settings).await {
                Ok(Some(previous)) => previous,
                Ok(None) => {
                    tracing::debug!("Configuration unchanged, keeping current engine");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        generation = self.generation,
                        "Rejected configuration change, keeping current engine"
                    );
                    continue;
                }
            };

            let grace = self.drain_timeout;
            let drain = previous.drain(grace);
            tokio::pin!(drain);

            tokio::select! {
                outcome = &mut drain => self.finish_drain(outcome),
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested while draining previous engine");
                    let (previous, current) = tokio::join!(drain, self.shutdown());
                    log_drain(previous, grace);
                    return current;
                }
            }
        }

        self.shutdown().await
    }
}

/// Skip to the newest queued snapshot.
fn coalesce(
    mut latest: ProxySettings,
    updates: &mut mpsc::UnboundedReceiver<ProxySettings>,
) -> ProxySettings {
    let mut skipped = 0usize;
    while let Ok(next) = updates.try_recv() {
        latest = next;
        skipped += 1;
    }
    if skipped > 0 {
        tracing::debug!(skipped, "Coalesced queued configuration changes");
    }
    latest
}

fn log_drain(outcome: DrainOutcome, grace: Duration) {
    match outcome {
        DrainOutcome::Drained { connections } => {
            tracing::info!(connections, "Previous engine drained");
        }
        DrainOutcome::TimedOut { aborted } => {
            tracing::warn!(
                aborted,
                grace_period = ?grace,
                "Drain grace period exceeded, closing remaining connections"
            );
        }
    }
}
