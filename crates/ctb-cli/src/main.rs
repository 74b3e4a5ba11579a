use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use ctb_config::{load_layered_yaml, load_layered_yaml_from_strings, LoadedConfig};
use ctb_session::{Bridge, RawSyncRequest};
use ctb_transport::RemoteConnector;
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "ctb")]
#[command(about = "cTrader bridge operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync against the upstream API and print the JSON response
    Sync(SyncArgs),

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (defaults -> env overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(clap::Args)]
struct SyncArgs {
    /// `live`, `demo`, or a literal hostname
    #[arg(long)]
    host: String,

    #[arg(long)]
    client_id: String,

    #[arg(long, env = "CTB_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    #[arg(long, env = "CTB_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// cTID trader account id
    #[arg(long)]
    account_id: String,

    /// Range start: epoch milliseconds or RFC 3339
    #[arg(long)]
    from: String,

    /// Range end: epoch milliseconds or RFC 3339
    #[arg(long)]
    to: String,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = load_config(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Sync(args) => {
            let loaded = load_config(&args.config_paths)?;
            info!(config_hash = %loaded.config_hash, "configuration loaded");

            let bridge = Bridge::new(Arc::new(RemoteConnector), Arc::new(loaded.config));
            let resp = bridge.sync(&args.into_request()).await;
            println!("{}", serde_json::to_string_pretty(&resp)?);

            if !resp.ok {
                bail!(
                    "SYNC_FAILED: {}",
                    resp.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    Ok(())
}

impl SyncArgs {
    fn into_request(self) -> RawSyncRequest {
        RawSyncRequest {
            host: Some(Value::String(self.host)),
            client_id: Some(Value::String(self.client_id)),
            client_secret: Some(Value::String(self.client_secret)),
            access_token: Some(Value::String(self.access_token)),
            ctid_account_id: Some(Value::String(self.account_id)),
            from_timestamp: Some(time_arg(&self.from)),
            to_timestamp: Some(time_arg(&self.to)),
        }
    }
}

/// Epoch milliseconds pass through; RFC 3339 is converted. Anything else is
/// handed on as-is and reported by validation.
fn time_arg(s: &str) -> Value {
    match DateTime::parse_from_rfc3339(s.trim()) {
        Ok(t) => Value::from(t.timestamp_millis()),
        Err(_) => Value::String(s.to_string()),
    }
}

fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    if paths.is_empty() {
        return load_layered_yaml_from_strings(&[]);
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    load_layered_yaml(&path_refs)
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
