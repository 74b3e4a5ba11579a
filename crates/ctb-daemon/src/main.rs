//! ctb-daemon entry point.
//!
//! Thin on purpose: loads configuration, resolves the shared secret, builds
//! the shared state, wires middleware, and starts the HTTP server. Route
//! handlers live in `routes.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use ctb_config::{
    load_layered_yaml, load_layered_yaml_from_strings, resolve_shared_secret, LoadedConfig,
};
use ctb_daemon::{routes, state};
use ctb_session::Bridge;
use ctb_transport::RemoteConnector;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

/// Comma-separated config paths in merge order.
const ENV_CONFIG: &str = "CTB_CONFIG";
const ENV_ADDR: &str = "CTB_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config()?;
    info!(
        config_hash = %loaded.config_hash,
        framing = loaded.config.framing.as_str(),
        "configuration loaded"
    );

    // Fail closed: no secret, no daemon.
    let secret = resolve_shared_secret(&loaded.config)?;

    let config = Arc::new(loaded.config);
    let bridge = Bridge::new(Arc::new(RemoteConnector), Arc::clone(&config));
    let shared = Arc::new(state::AppState::new(bridge, secret, loaded.config_hash));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = match bind_addr_from_env() {
        Some(addr) => addr,
        None => config
            .listen_addr
            .parse()
            .with_context(|| format!("CONFIG_INVALID: listen_addr {:?}", config.listen_addr))?,
    };
    info!("ctb-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_config() -> anyhow::Result<LoadedConfig> {
    match std::env::var(ENV_CONFIG) {
        Ok(paths) if !paths.trim().is_empty() => {
            let paths: Vec<&str> = paths.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
            load_layered_yaml(&paths)
        }
        _ => {
            info!("{ENV_CONFIG} not set; using built-in defaults");
            load_layered_yaml_from_strings(&[])
        }
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_ADDR).ok()?.parse().ok()
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
