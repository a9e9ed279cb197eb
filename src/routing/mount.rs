//! Mount point definition.
//!
//! # Responsibilities
//! - Describe the inbound path pattern the engine accepts
//! - Expose the wildcard position used by path rewriting
//! - Produce the axum route patterns that implement the mount

/// Inbound path pattern with a single trailing wildcard segment.
///
/// The pattern is written in the familiar `/<prefix>*<name>` form; everything
/// from the `*` onward matches the remainder of the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mount {
    pattern: &'static str,
    wildcard_index: usize,
}

impl Mount {
    /// The root catch-all mount: every path is accepted.
    pub const fn catch_all() -> Self {
        Self {
            pattern: "/*catchall",
            wildcard_index: 1,
        }
    }

    /// The pattern as written.
    pub fn pattern(&self) -> &'static str {
        self.pattern
    }

    /// Byte offset of the wildcard within the pattern.
    pub fn wildcard_index(&self) -> usize {
        self.wildcard_index
    }

    /// Fixed prefix preceding the wildcard (`/` for the root mount).
    pub fn prefix(&self) -> &'static str {
        &self.pattern[..self.wildcard_index]
    }

    /// Route patterns to register with axum.
    ///
    /// axum's `{*rest}` wildcard does not match an empty remainder, so the
    /// bare prefix is registered as well.
    pub fn route_patterns(&self) -> [String; 2] {
        let prefix = self.prefix();
        [format!("{prefix}{{*rest}}"), prefix.to_string()]
    }

    /// Suffix of `path` that the wildcard captured.
    ///
    /// Paths shorter than the prefix (which the router never hands us) yield
    /// an empty suffix.
    pub fn captured<'a>(&self, path: &'a str) -> &'a str {
        path.get(self.wildcard_index..).unwrap_or("")
    }
}

impl Default for Mount {
    fn default() -> Self {
        Self::catch_all()
    }
}
