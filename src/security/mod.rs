//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → credential.rs (bearer token injected by the director)
//!     → headers.rs (strip hop-by-hop, append X-Forwarded-For)
//!     → Upstream
//!
//! Upstream response:
//!     → headers.rs (strip hop-by-hop)
//!     → Client
//! ```
//!
//! # Design Decisions
//! - The token lives in a `SecretString` and is redacted from Debug output
//! - The injected header value is marked sensitive
//! - Inbound clients are not authenticated

pub mod credential;
pub mod headers;

pub use credential::Credential;
