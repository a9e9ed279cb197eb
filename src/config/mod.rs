//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML/TOML)
//!     → loader.rs (locate, parse & deserialize)
//!     → ProxySettings {target, token, addr}
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads new settings
//!     → snapshot sent on the update channel
//!     → lifecycle supervisor validates and swaps engines
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes produce a new snapshot
//! - Validation separates syntactic (serde) from semantic checks
//! - Loading failures on reload never reach the supervisor

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_settings, locate_config, ConfigError};
pub use schema::ProxySettings;
pub use validation::{validate_settings, BindAddress, EngineConfig, ValidationError};
