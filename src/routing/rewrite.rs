//! Upstream path rewriting.

use crate::routing::Mount;

/// Join `a` and `b` with exactly one `/` between them.
fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{a}{}", &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}

/// Compute the upstream path for `request_path` under `mount`.
///
/// The part of the request path captured by the mount's wildcard is appended
/// to `base_path`. A trailing slash is dropped unless the result is `/`.
pub fn rewrite_path(mount: &Mount, base_path: &str, request_path: &str) -> String {
    let mut path = single_joining_slash(base_path, mount.captured(request_path));
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}
