//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use hyper_util::rt::TokioIo;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

use mini_auth_proxy::{ProxySettings, Supervisor};

/// Start an upstream that echoes the request it received as JSON.
///
/// Query parameters steer it: `delay_ms=N` sleeps before answering and
/// `status=N` sets the response status. `/upgrade` switches to a raw byte
/// echo when asked with `Connection: upgrade`.
pub async fn start_echo_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/upgrade", any(upgrade_echo))
        .route("/", any(echo))
        .route("/{*rest}", any(echo));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn echo(request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let params: HashMap<String, String> = parts
        .uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if let Some(ms) = params.get("delay_ms").and_then(|v| v.parse().ok()) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    let mut headers = Map::new();
    for name in parts.headers.keys() {
        let values = parts
            .headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(v.to_str().unwrap_or_default().to_string()))
            .collect();
        headers.insert(name.as_str().to_string(), Value::Array(values));
    }

    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let status = params
        .get("status")
        .and_then(|s| s.parse::<u16>().ok())
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::OK);

    let echoed = json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    });
    (status, Json(echoed)).into_response()
}

async fn upgrade_echo(mut request: Request<Body>) -> Response {
    let Some(protocol) = request.headers().get(header::UPGRADE).cloned() else {
        return (StatusCode::BAD_REQUEST, "missing Upgrade").into_response();
    };
    let connection = request
        .headers()
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !connection.eq_ignore_ascii_case("upgrade") {
        return (StatusCode::BAD_REQUEST, "missing Connection: upgrade").into_response();
    }

    let on_upgrade = hyper::upgrade::on(&mut request);
    tokio::spawn(async move {
        let upgraded = on_upgrade.await.unwrap();
        let (mut reader, mut writer) = tokio::io::split(TokioIo::new(upgraded));
        let _ = tokio::io::copy(&mut reader, &mut writer).await;
    });

    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, protocol)
        .body(Body::empty())
        .unwrap()
}

/// An address nothing is listening on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn settings(target: &str, token: &str) -> ProxySettings {
    ProxySettings::new(target, token, "127.0.0.1:0")
}

pub async fn start_proxy(target: &str, token: &str) -> Supervisor {
    Supervisor::start(&settings(target, token), Duration::from_secs(5))
        .await
        .unwrap()
}

/// Client that never goes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn url(proxy: SocketAddr, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", proxy.port(), path)
}

/// GET through the proxy and decode the echoed request.
pub async fn get_echo(proxy: SocketAddr, path: &str) -> Value {
    let res = client().get(url(proxy, path)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    res.json().await.unwrap()
}

/// All values the upstream saw for a header.
pub fn header_values(echo: &Value, name: &str) -> Vec<String> {
    echo["headers"][name]
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Poll `check` until it holds or the timeout passes.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
