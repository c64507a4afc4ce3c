//! RidgeKV Server Binary
//!
//! Starts the TCP server for RidgeKV.

use std::sync::Arc;

use clap::Parser;

use ridgekv::network::Server;
use ridgekv::{Config, Engine};

/// RidgeKV Server
#[derive(Parser, Debug)]
#[command(name = "ridgekv-server")]
#[command(about = "High-performance distributed key-value store")]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./ridgekv_data")]
    data_dir: String,

    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    listen: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .build();

    let engine = Arc::new(Engine::open(config.clone()).expect("failed to open engine"));
    tracing::info!(data_dir = %config.data_dir.display(), "engine opened");

    let mut server = Server::new(config, engine);
    if let Err(e) = server.run() {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }
}
