//! Configuration validation.
//!
//! # Responsibilities
//! - Parse the upstream target into an absolute http(s) URL
//! - Check that the token can travel in an HTTP header
//! - Normalize and check the bind address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: ProxySettings → EngineConfig
//! - Runs before a settings snapshot is accepted into the system

use std::fmt;

use thiserror::Error;

use crate::config::schema::ProxySettings;
use crate::http::upstream::Upstream;
use crate::security::credential::Credential;

/// A single semantic problem with a settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid target {target:?}: {reason}")]
    Target { target: String, reason: String },

    #[error("invalid token: {0}")]
    Token(String),

    #[error("invalid bind address {addr:?}: {reason}")]
    Addr { addr: String, reason: String },
}

/// Normalized `host:port` listen address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindAddress(String);

impl BindAddress {
    /// Parse a listen address. A bare `:port` binds every IPv4 interface.
    pub fn parse(addr: &str) -> Result<Self, String> {
        let addr = addr.trim();
        let normalized = if addr.starts_with(':') {
            format!("0.0.0.0{addr}")
        } else {
            addr.to_string()
        };

        let (host, port) = normalized
            .rsplit_once(':')
            .ok_or_else(|| "expected host:port".to_string())?;
        if host.is_empty() {
            return Err("missing host".to_string());
        }
        port.parse::<u16>()
            .map_err(|_| format!("invalid port {port:?}"))?;

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The configured port (0 asks the OS for one).
    pub fn port(&self) -> u16 {
        self.0
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or(0)
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated settings snapshot, ready to build an engine from.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub upstream: Upstream,
    pub credential: Credential,
    pub bind: BindAddress,
}

/// Validate a settings snapshot.
pub fn validate_settings(settings: &ProxySettings) -> Result<EngineConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let upstream = Upstream::parse(&settings.target)
        .map_err(|reason| {
            errors.push(ValidationError::Target {
                target: settings.target.clone(),
                reason,
            })
        })
        .ok();

    let credential = Credential::bearer(settings.token.clone())
        .map_err(|e| errors.push(ValidationError::Token(e.to_string())))
        .ok();

    let bind = BindAddress::parse(&settings.addr)
        .map_err(|reason| {
            errors.push(ValidationError::Addr {
                addr: settings.addr.clone(),
                reason,
            })
        })
        .ok();

    match (upstream, credential, bind) {
        (Some(upstream), Some(credential), Some(bind)) => Ok(EngineConfig {
            upstream,
            credential,
            bind,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_style_port_binds_all_interfaces() {
        let addr = BindAddress::parse(":8080").unwrap();
        assert_eq!(addr.as_str(), "0.0.0.0:8080");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn port_of_ipv6_address() {
        assert_eq!(BindAddress::parse("[::1]:9000").unwrap().port(), 9000);
    }

    #[test]
    fn explicit_hosts_are_kept() {
        assert_eq!(BindAddress::parse("127.0.0.1:0").unwrap().as_str(), "127.0.0.1:0");
        assert_eq!(BindAddress::parse("[::1]:9000").unwrap().as_str(), "[::1]:9000");
        assert_eq!(BindAddress::parse("localhost:9000").unwrap().as_str(), "localhost:9000");
    }

    #[test]
    fn bad_addresses_rejected() {
        assert!(BindAddress::parse("8080").is_err());
        assert!(BindAddress::parse("host:http").is_err());
        assert!(BindAddress::parse("host:70000").is_err());
    }

    #[test]
    fn valid_settings() {
        let settings = ProxySettings::new("http://backend:9000/api", "secret", ":8080");
        let config = validate_settings(&settings).unwrap();
        assert_eq!(config.upstream.host(), "backend:9000");
        assert_eq!(config.upstream.base_path(), "/api");
        assert_eq!(config.bind.as_str(), "0.0.0.0:8080");
    }

    #[test]
    fn collects_every_error() {
        let settings = ProxySettings::new("not a url", "bad\ntoken", "nope");
        let errors = validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ValidationError::Target { .. }));
        assert!(matches!(errors[1], ValidationError::Token(_)));
        assert!(matches!(errors[2], ValidationError::Addr { .. }));
    }

    #[test]
    fn token_never_in_error_text() {
        let settings = ProxySettings::new("http://backend", "leak\nme", ":80");
        let errors = validate_settings(&settings).unwrap_err();
        assert!(!errors[0].to_string().contains("leak"));
    }
}
