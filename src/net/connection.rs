//! Connection acceptance and drain tracking.
//!
//! # Responsibilities
//! - Accept connections until told to stop
//! - Serve each connection (HTTP/1.1 or HTTP/2) on its own task
//! - Generate connection IDs for tracing
//! - Drain in-flight connections with a deadline

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tower::ServiceExt;

use crate::net::listener::Listener;

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Global atomic counter for connection IDs. Only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight connection finished within the grace period.
    Drained { connections: usize },
    /// The grace period ran out and the remaining connections were closed.
    TimedOut { aborted: usize },
}

/// Connections accepted by one engine that may still be in flight.
pub struct Connections {
    graceful: GracefulShutdown,
    tasks: JoinSet<()>,
}

impl Connections {
    pub fn new() -> Self {
        Self {
            graceful: GracefulShutdown::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Number of connection tasks not yet reaped.
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    fn serve(
        &mut self,
        builder: &auto::Builder<TokioExecutor>,
        stream: TcpStream,
        peer: SocketAddr,
        app: Router,
    ) {
        let id = ConnectionId::new();
        tracing::trace!(connection_id = %id, peer_addr = %peer, "Connection accepted");

        let service = service_fn(move |mut request: Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(peer));
            app.clone().oneshot(request)
        });

        let conn = builder
            .serve_connection_with_upgrades(TokioIo::new(stream), service)
            .into_owned();
        let conn = self.graceful.watch(conn);

        self.tasks.spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %id, error = %e, "Connection error");
            }
            tracing::trace!(connection_id = %id, "Connection closed");
        });
    }

    fn reap(&mut self) {
        while self.tasks.try_join_next().is_some() {}
    }

    /// Ask every connection to finish its current request and close, waiting
    /// at most `grace`. Connections still open afterwards are aborted.
    pub async fn drain(mut self, grace: Duration) -> DrainOutcome {
        self.reap();
        let Self {
            graceful,
            mut tasks,
        } = self;
        let in_flight = tasks.len();

        match tokio::time::timeout(grace, graceful.shutdown()).await {
            Ok(()) => {
                while tasks.join_next().await.is_some() {}
                DrainOutcome::Drained {
                    connections: in_flight,
                }
            }
            Err(_) => {
                while tasks.try_join_next().is_some() {}
                let aborted = tasks.len();
                tasks.shutdown().await;
                DrainOutcome::TimedOut { aborted }
            }
        }
    }
}

impl Default for Connections {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept connections on `listener` until `stop` fires, then hand back the
/// connections still in flight.
pub async fn accept_loop(
    listener: Listener,
    app: Router,
    mut stop: oneshot::Receiver<()>,
) -> Connections {
    let builder = auto::Builder::new(TokioExecutor::new());
    let mut connections = Connections::new();

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            accepted = listener.as_tcp().accept() => match accepted {
                Ok((stream, peer)) => connections.serve(&builder, stream, peer, app.clone()),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
        connections.reap();
    }

    tracing::debug!(
        address = %listener.local_addr(),
        in_flight = connections.active_count(),
        "Stopped accepting connections"
    );
    connections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[tokio::test]
    async fn empty_set_drains_immediately() {
        let outcome = Connections::new().drain(Duration::from_millis(10)).await;
        assert_eq!(outcome, DrainOutcome::Drained { connections: 0 });
    }
}
