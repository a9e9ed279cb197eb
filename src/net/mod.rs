//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Bind address
//!     → listener.rs (bind, remember local address)
//!     → connection.rs (accept loop, one task per connection)
//!     → Hand off to the engine's router
//!
//! Connection States:
//!     Accepting → Active → Draining → Closed (or Aborted after the grace period)
//! ```
//!
//! # Design Decisions
//! - A bound listener is shared by `Arc` so it can be handed to a successor engine
//! - Each connection is tracked for graceful drain
//! - Draining is bounded; stragglers are aborted

pub mod connection;
pub mod listener;
