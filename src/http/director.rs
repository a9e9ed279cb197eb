//! Per-request rewrite applied before forwarding.
//!
//! # Responsibilities
//! - Record provenance (X-Forwarded-Host, X-Origin-Host)
//! - Point the request URI at the upstream
//! - Inject the bearer credential when the client sent none
//! - Rewrite the path under the mount and force the Host header
//!
//! # Design Decisions
//! - Provenance headers are appended, never replaced
//! - A client `Authorization` header always wins
//! - The query string passes through untouched

use axum::http::header::{self, HeaderValue};
use axum::http::{Request, Uri};

use crate::http::upstream::Upstream;
use crate::routing::{rewrite_path, Mount};
use crate::security::credential::Credential;
use crate::security::headers::{X_FORWARDED_HOST, X_ORIGIN_HOST};

/// Rewrites inbound requests for one upstream and credential.
#[derive(Debug, Clone)]
pub struct Director {
    upstream: Upstream,
    credential: Credential,
    mount: Mount,
}

impl Director {
    pub fn new(upstream: Upstream, credential: Credential, mount: Mount) -> Self {
        Self {
            upstream,
            credential,
            mount,
        }
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    /// Rewrite `request` in place for the upstream.
    pub fn direct<B>(&self, request: &mut Request<B>) -> Result<(), axum::http::Error> {
        let client_host = request
            .headers()
            .get(header::HOST)
            .cloned()
            .or_else(|| {
                request
                    .uri()
                    .authority()
                    .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
            })
            .unwrap_or_else(|| HeaderValue::from_static(""));

        let path = rewrite_path(&self.mount, self.upstream.base_path(), request.uri().path());
        let path_and_query = match request.uri().query() {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };
        let uri = Uri::builder()
            .scheme(self.upstream.scheme().clone())
            .authority(self.upstream.authority().clone())
            .path_and_query(path_and_query)
            .build()?;

        let headers = request.headers_mut();
        headers.append(X_FORWARDED_HOST, client_host);
        headers.append(X_ORIGIN_HOST, self.upstream.host_header().clone());

        let has_authorization = headers
            .get(header::AUTHORIZATION)
            .is_some_and(|v| !v.is_empty());
        if !has_authorization {
            headers.insert(header::AUTHORIZATION, self.credential.header_value().clone());
        }

        headers.insert(header::HOST, self.upstream.host_header().clone());
        *request.uri_mut() = uri;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use secrecy::SecretString;

    fn director(target: &str, token: &str) -> Director {
        Director::new(
            Upstream::parse(target).unwrap(),
            Credential::bearer(SecretString::from(token.to_string())).unwrap(),
            Mount::catch_all(),
        )
    }

    fn request(uri: &str) -> axum::http::request::Builder {
        Request::builder().uri(uri).header("host", "proxy.local:8080")
    }

    #[test]
    fn scenario_users_lookup() {
        let director = director("http://backend:9000/api", "secret");
        let mut req = request("/users/1").body(Body::empty()).unwrap();

        director.direct(&mut req).unwrap();

        assert_eq!(req.uri().to_string(), "http://backend:9000/api/users/1");
        let headers = req.headers();
        assert_eq!(headers.get("x-forwarded-host").unwrap(), "proxy.local:8080");
        assert_eq!(headers.get("x-origin-host").unwrap(), "backend:9000");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer secret");
        assert_eq!(headers.get("host").unwrap(), "backend:9000");
    }

    #[test]
    fn injects_exactly_one_authorization() {
        let director = director("http://backend", "secret");
        let mut req = request("/").body(Body::empty()).unwrap();

        director.direct(&mut req).unwrap();

        let values: Vec<_> = req.headers().get_all("authorization").iter().collect();
        assert_eq!(values, vec!["Bearer secret"]);
    }

    #[test]
    fn client_authorization_passes_through() {
        let director = director("http://backend", "secret");
        let mut req = request("/")
            .header("authorization", "Bearer client-token")
            .body(Body::empty())
            .unwrap();

        director.direct(&mut req).unwrap();

        let values: Vec<_> = req.headers().get_all("authorization").iter().collect();
        assert_eq!(values, vec!["Bearer client-token"]);
    }

    #[test]
    fn empty_authorization_is_replaced() {
        let director = director("http://backend", "secret");
        let mut req = request("/")
            .header("authorization", "")
            .body(Body::empty())
            .unwrap();

        director.direct(&mut req).unwrap();

        let values: Vec<_> = req.headers().get_all("authorization").iter().collect();
        assert_eq!(values, vec!["Bearer secret"]);
    }

    #[test]
    fn provenance_headers_are_additive() {
        let director = director("http://backend:9000", "t");
        let mut req = request("/")
            .header("x-forwarded-host", "edge.example")
            .header("x-origin-host", "first-hop:1")
            .body(Body::empty())
            .unwrap();

        director.direct(&mut req).unwrap();

        let forwarded: Vec<_> = req.headers().get_all("x-forwarded-host").iter().collect();
        assert_eq!(forwarded, vec!["edge.example", "proxy.local:8080"]);
        let origin: Vec<_> = req.headers().get_all("x-origin-host").iter().collect();
        assert_eq!(origin, vec!["first-hop:1", "backend:9000"]);
    }

    #[test]
    fn host_is_always_upstream() {
        let director = director("https://api.example.com/v2", "t");
        let mut req = Request::builder()
            .uri("http://evil.example/x")
            .header("host", "evil.example")
            .body(Body::empty())
            .unwrap();

        director.direct(&mut req).unwrap();

        assert_eq!(req.uri().scheme_str(), Some("https"));
        assert_eq!(req.uri().host(), Some("api.example.com"));
        assert_eq!(req.uri().path(), "/v2/x");
        assert_eq!(req.headers().get("host").unwrap(), "api.example.com");
    }

    #[test]
    fn absolute_form_host_used_when_header_missing() {
        let director = director("http://backend", "t");
        let mut req = Request::builder()
            .uri("http://client.example/x")
            .body(Body::empty())
            .unwrap();

        director.direct(&mut req).unwrap();

        assert_eq!(req.headers().get("x-forwarded-host").unwrap(), "client.example");
    }

    #[test]
    fn trailing_slash_and_query() {
        let director = director("http://backend", "t");

        let mut req = request("/foo/?page=2&q=a%20b").body(Body::empty()).unwrap();
        director.direct(&mut req).unwrap();
        assert_eq!(req.uri().path(), "/foo");
        assert_eq!(req.uri().query(), Some("page=2&q=a%20b"));

        let mut req = request("/").body(Body::empty()).unwrap();
        director.direct(&mut req).unwrap();
        assert_eq!(req.uri().path(), "/");
    }
}
