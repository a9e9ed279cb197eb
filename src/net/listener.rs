//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Remember the resolved local address
//! - Share the socket between an engine and its successor

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::config::BindAddress;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

impl ListenerError {
    /// Whether the address was already taken by another socket.
    pub fn is_addr_in_use(&self) -> bool {
        match self {
            Self::Bind { source, .. } => source.kind() == std::io::ErrorKind::AddrInUse,
        }
    }
}

/// A bound TCP listener.
///
/// Cloning shares the socket; it closes when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Listener {
    inner: Arc<TcpListener>,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(addr: &BindAddress) -> Result<Self, ListenerError> {
        Self::bind_to(addr.as_str(), addr.to_string()).await
    }

    /// Bind to an already resolved address, e.g. one a previous listener held.
    pub async fn bind_local(addr: SocketAddr) -> Result<Self, ListenerError> {
        Self::bind_to(addr, addr.to_string()).await
    }

    async fn bind_to<A: ToSocketAddrs>(target: A, addr: String) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind {
            addr: addr.clone(),
            source,
        };

        let listener = TcpListener::bind(target).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner: Arc::new(listener),
            local_addr,
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn as_tcp(&self) -> &TcpListener {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let addr = BindAddress::parse("127.0.0.1:0").unwrap();
        let listener = Listener::bind(&addr).await.unwrap();
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn conflicting_bind_fails() {
        let first = Listener::bind(&BindAddress::parse("127.0.0.1:0").unwrap())
            .await
            .unwrap();
        let taken = BindAddress::parse(&first.local_addr().to_string()).unwrap();
        let err = Listener::bind(&taken).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
        assert!(err.is_addr_in_use());
    }

    #[tokio::test]
    async fn released_address_can_be_bound_again() {
        let first = Listener::bind(&BindAddress::parse("127.0.0.1:0").unwrap())
            .await
            .unwrap();
        let addr = first.local_addr();
        drop(first);

        let again = Listener::bind_local(addr).await.unwrap();
        assert_eq!(again.local_addr(), addr);
    }
}
