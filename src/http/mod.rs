//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (net::connection)
//!     → server.rs (axum router on the catch-all mount, request logging)
//!     → director.rs (upstream URI, provenance headers, credential, Host)
//!     → upstream.rs (HTTP/HTTPS client)
//!     → response streamed back unmodified
//! ```

pub mod director;
pub mod server;
pub mod upstream;

pub use director::Director;
pub use server::{EngineError, ForwardingEngine, RunningEngine};
pub use upstream::Upstream;
