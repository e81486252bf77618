//! Backchannel server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port
//! backchannel-server
//!
//! # Custom bind address and verbose logging
//! backchannel-server --bind 0.0.0.0:8080 --log-level debug
//! ```

use backchannel_server::{RouterConfig, Server, ServerRuntimeConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Backchannel room broadcast server
#[derive(Parser, Debug)]
#[command(name = "backchannel-server")]
#[command(about = "Ephemeral room reaction/Q&A broadcast server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3001")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("backchannel server starting");
    tracing::info!("binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        router: RouterConfig { max_connections: args.max_connections },
    };

    let server = Server::bind(config).await?;

    tracing::info!("server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
