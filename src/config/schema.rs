//! Configuration schema definitions.

use secrecy::SecretString;
use serde::Deserialize;

/// The settings triple read from the configuration file.
///
/// ```yaml
/// target: http://backend:9000/api
/// token: secret
/// addr: ":8080"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProxySettings {
    /// Absolute URL of the upstream service.
    pub target: String,

    /// Bearer token presented to the upstream.
    pub token: SecretString,

    /// Listen address (`host:port`, or `:port` for all interfaces).
    pub addr: String,
}

impl ProxySettings {
    pub fn new(
        target: impl Into<String>,
        token: impl Into<String>,
        addr: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            token: SecretString::from(token.into()),
            addr: addr.into(),
        }
    }
}
