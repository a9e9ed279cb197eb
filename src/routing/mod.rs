//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request path
//!     → mount.rs (catch-all mount, wildcard position)
//!     → rewrite.rs (suffix after wildcard joined onto upstream base path)
//!     → Upstream path used by the director
//! ```
//!
//! # Design Decisions
//! - A single mount that matches every path; there is no route table
//! - Rewriting is a pure function with no allocation beyond the result
//! - Trailing slashes are normalized away, except for the root path

pub mod mount;
pub mod rewrite;

pub use mount::Mount;
pub use rewrite::rewrite_path;
