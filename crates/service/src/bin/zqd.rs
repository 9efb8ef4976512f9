//! `zqd`: the HTTP server process (spec §2 "zqd", §6).
//!
//! Resolves a storage root through a [`SourceRegistry`], recovers every
//! known space via [`SpaceRegistry::open`], and serves the
//! space/search/ingest API built by [`zq_service::router`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::BoxError;
use clap::Parser;
use tower::ServiceBuilder;

use zq_service::{router, AppState, ServerConfig, SpaceRegistry};
use zq_storage::SourceRegistry;

/// Command-line arguments for `zqd`, each overridable by an equivalent
/// env var (the same shape the CLI's global flags take, minus the
/// interactive-shell concerns a server process has no use for).
/// Collapsed into a [`ServerConfig`] before anything else runs, so the
/// config type itself — not this struct — is what the rest of the
/// process reads from.
#[derive(Parser, Debug)]
#[command(name = "zqd", about = "zq search/analytics server")]
struct Args {
    /// Storage root under which every space's data lives, as a URI or
    /// local path.
    #[arg(long, env = "ZQD_ROOT", default_value = "./zqd-root")]
    root: String,

    /// Address to listen on.
    #[arg(long, env = "ZQD_LISTEN", default_value = "127.0.0.1:9867")]
    listen: SocketAddr,

    /// Full-request deadline, in seconds; 0 disables it (spec §5
    /// "Request deadline via context — full cancellation").
    #[arg(long, env = "ZQD_REQUEST_TIMEOUT_SECS", default_value_t = 300)]
    request_timeout_secs: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> ServerConfig {
        let mut cfg = ServerConfig::new(args.root);
        cfg.listen_addr = args.listen;
        cfg.request_timeout = (args.request_timeout_secs > 0)
            .then(|| Duration::from_secs(args.request_timeout_secs));
        cfg
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zqd=info,zq_service=info,tower_http=info".into()),
        )
        .init();

    let cfg: ServerConfig = Args::parse().into();

    let source_registry = SourceRegistry::with_defaults();
    let source = source_registry.resolve(&cfg.root)?;

    let space_registry = Arc::new(SpaceRegistry::open(source, cfg.root.clone())?);
    tracing::info!(root = %cfg.root, spaces = space_registry.list().len(), "recovered spaces");

    let app = router(AppState { registry: space_registry });

    let app = match cfg.request_timeout {
        Some(timeout) => app.layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .timeout(timeout),
        ),
        None => app,
    };

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    tracing::info!(addr = %cfg.listen_addr, "zqd listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_timeout_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("unhandled error: {err}"))
    }
}
