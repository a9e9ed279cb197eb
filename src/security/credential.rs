//! Bearer credential presented to the upstream.

use std::fmt;

use axum::http::header::{HeaderValue, InvalidHeaderValue};
use secrecy::{ExposeSecret, SecretString};

/// An immutable bearer token and its pre-built `Authorization` value.
#[derive(Clone)]
pub struct Credential {
    token: SecretString,
    header: HeaderValue,
}

impl Credential {
    /// Build a `Bearer <token>` credential.
    ///
    /// Fails if the token contains bytes that cannot appear in a header value.
    pub fn bearer(token: SecretString) -> Result<Self, InvalidHeaderValue> {
        let mut header = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
        header.set_sensitive(true);
        Ok(Self { token, header })
    }

    /// The `Authorization` header value.
    pub fn header_value(&self) -> &HeaderValue {
        &self.header
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.token.expose_secret() == other.token.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
