// Allow dead code for API surface not yet exposed via RPC
#![allow(dead_code)]

mod ai;
mod entitlement;
mod profile;
mod rpc;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nutria-core")]
#[command(about = "Nutria Core - Backend engine for the Nutria nutrition coach")]
struct Cli {
    #[arg(long, default_value = "http")]
    mode: String,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value = "21530")]
    port: u16,

    /// Override the profile data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(rpc::default_data_dir);

    match cli.mode.as_str() {
        "http" => {
            tracing::info!(
                "Starting nutria-core HTTP server on {}:{}",
                cli.host,
                cli.port
            );
            rpc::run_http_server(&cli.host, cli.port, data_dir).await
        }
        "stdio" => {
            tracing::info!("Starting nutria-core JSON-RPC server (stdio mode)");
            rpc::run_stdio_server(data_dir).await
        }
        _ => {
            anyhow::bail!("Invalid mode: {}. Use 'http' or 'stdio'", cli.mode)
        }
    }
}
