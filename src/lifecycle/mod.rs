//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Locate config → Load → Validate → Bind → Serve → Watch
//!
//! Reconfiguration (supervisor.rs):
//!     Snapshot received → Validate → Build engine → Obtain listener
//!     → Swap current engine → Drain previous (bounded)
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGINT/SIGTERM → Stop accepting → Drain → Exit
//!     SIGHUP → Re-read config file → Reconfiguration
//! ```
//!
//! # Design Decisions
//! - Startup errors are fatal; reconfiguration errors only reject the change
//! - One reconfiguration at a time; queued snapshots coalesce to the latest
//! - Drains have a deadline: remaining connections are closed after it

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use supervisor::{EngineStatus, LifecycleError, Phase, Reconfigured, Supervisor};
