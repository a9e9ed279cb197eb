//! mini-auth-proxy
//!
//! Forwards every request to a single upstream, adding
//! `Authorization: Bearer <token>` when the client sent none.
//!
//! ```text
//!                  ┌──────────────────────────────────────────────┐
//!                  │                 MINI-AUTH-PROXY                │
//!     Client       │  ┌──────────┐   ┌──────────┐   ┌──────────┐   │
//!     ─────────────┼─▶│   net    │──▶│  engine  │──▶│ director │───┼──▶ Upstream
//!                  │  │ listener │   │ (axum)   │   │ + token  │   │
//!                  │  └──────────┘   └──────────┘   └──────────┘   │
//!                  │        ▲                                       │
//!                  │  ┌─────┴──────────────────────────────────┐    │
//!                  │  │ supervisor: swap engine on config change│    │
//!                  │  │ (file watcher, SIGHUP), drain on exit   │    │
//!                  │  └────────────────────────────────────────┘    │
//!                  └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use mini_auth_proxy::lifecycle::startup::{self, StartupOptions};
use mini_auth_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "mini-auth-proxy")]
#[command(about = "Reverse proxy that injects a bearer token for clients", long_about = None)]
struct Cli {
    /// Config file (YAML or TOML). Searched for in ~/.mini-auth-proxy and the
    /// working directory when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to let in-flight requests finish when an engine is retired.
    #[arg(long, default_value_t = 5)]
    drain_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init();

    tracing::info!("mini-auth-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let options = StartupOptions {
        config_path: cli.config,
        drain_timeout: Duration::from_secs(cli.drain_timeout),
    };

    match startup::run(options).await {
        Ok(outcome) => {
            tracing::info!(?outcome, "Shutdown complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            Err(e.into())
        }
    }
}
