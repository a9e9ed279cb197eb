//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!
//! Per request:
//!     → logging.rs trace layer (span with method and URI, response line
//!       with status and latency)
//! ```
//!
//! # Design Decisions
//! - Log level configurable via `RUST_LOG`
//! - Header contents are never recorded, so the credential stays out of logs

pub mod logging;
