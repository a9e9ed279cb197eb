//! Bearer-token injecting reverse proxy library

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::ProxySettings;
pub use http::{ForwardingEngine, RunningEngine};
pub use lifecycle::{Shutdown, Supervisor};
