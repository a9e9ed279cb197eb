//! Upstream target and the client used to reach it.
//!
//! # Responsibilities
//! - Parse the configured target into scheme, authority and base path
//! - Build the HTTP/HTTPS client for one engine instance
//!
//! # Design Decisions
//! - Only absolute `http`/`https` URLs with a host are accepted
//! - HTTPS uses rustls with the platform's root certificates
//! - A plain-HTTP upstream still works on hosts without a CA bundle

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::uri::{Authority, Scheme};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use rustls::{ClientConfig, RootCertStore};
use url::Url;

use crate::http::server::EngineError;

/// Upstream connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client type shared by every request an engine forwards.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// The single backend an engine forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    host_header: HeaderValue,
}

impl Upstream {
    /// Parse a target URL such as `http://backend:9000/api`.
    pub fn parse(target: &str) -> Result<Self, String> {
        let url = Url::parse(target.trim()).map_err(|e| e.to_string())?;

        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(format!("unsupported scheme {other:?}")),
        };

        let host = url.host_str().ok_or_else(|| "missing host".to_string())?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&host).map_err(|e| e.to_string())?;
        let host_header = HeaderValue::from_str(authority.as_str()).map_err(|e| e.to_string())?;

        Ok(Self {
            scheme,
            authority,
            base_path: url.path().to_string(),
            host_header,
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// `host[:port]` as it appears in the target URL.
    pub fn host(&self) -> &str {
        self.authority.as_str()
    }

    /// The host as a ready-made header value.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.base_path)
    }
}

fn install_crypto_provider() {
    static PROVIDER: OnceLock<()> = OnceLock::new();
    PROVIDER.get_or_init(|| {
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            // Losing a race here means another provider is already in place.
            let _ = rustls::crypto::ring::default_provider().install_default();
        }
    });
}

/// Build the client for `upstream`.
pub fn build_client(upstream: &Upstream) -> Result<UpstreamClient, EngineError> {
    install_crypto_provider();

    let tls = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) if upstream.scheme() == &Scheme::HTTP => {
            tracing::debug!(error = %e, "No native TLS roots available, upstream is plain HTTP");
            HttpsConnectorBuilder::new().with_tls_config(
                ClientConfig::builder()
                    .with_root_certificates(RootCertStore::empty())
                    .with_no_client_auth(),
            )
        }
        Err(e) => return Err(EngineError::TlsRoots(e)),
    };

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);
    http.set_connect_timeout(Some(CONNECT_TIMEOUT));

    let connector = tls.https_or_http().enable_http1().wrap_connector(http);

    Ok(Client::builder(TokioExecutor::new()).build(connector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_and_path() {
        let upstream = Upstream::parse("http://backend:9000/api").unwrap();
        assert_eq!(upstream.scheme(), &Scheme::HTTP);
        assert_eq!(upstream.host(), "backend:9000");
        assert_eq!(upstream.host_header(), "backend:9000");
        assert_eq!(upstream.base_path(), "/api");
        assert_eq!(upstream.to_string(), "http://backend:9000/api");
    }

    #[test]
    fn bare_origin_has_root_path() {
        let upstream = Upstream::parse("https://api.example.com").unwrap();
        assert_eq!(upstream.scheme(), &Scheme::HTTPS);
        assert_eq!(upstream.host(), "api.example.com");
        assert_eq!(upstream.base_path(), "/");
    }

    #[test]
    fn userinfo_is_not_part_of_host() {
        let upstream = Upstream::parse("http://user:pw@backend:9000/").unwrap();
        assert_eq!(upstream.host(), "backend:9000");
        assert!(!upstream.to_string().contains("pw"));
    }

    #[test]
    fn ipv6_host_keeps_brackets() {
        let upstream = Upstream::parse("http://[::1]:8080").unwrap();
        assert_eq!(upstream.host(), "[::1]:8080");
    }

    #[test]
    fn rejects_bad_targets() {
        assert!(Upstream::parse("backend:9000").is_err());
        assert!(Upstream::parse("ftp://backend").is_err());
        assert!(Upstream::parse("not a url").is_err());
        assert!(Upstream::parse("").is_err());
    }
}
