//! modulable-web
//!
//! Runs the host from a TOML configuration file: static mounts, views and
//! the default `'404'` / `'500'` responses.
//!
//! ```text
//! modulable-web --config web.toml
//! PORT=8080 RUST_LOG=debug modulable-web --config web.toml
//! ```

use std::path::PathBuf;

use clap::Parser;

use modulable_web::config::{load_config, WebConfig};
use modulable_web::observability::{logging, metrics};
use modulable_web::Host;

#[derive(Parser, Debug)]
#[command(name = "modulable-web", version, about = "Modulable web host")]
struct Cli {
    /// Configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WebConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "modulable-web starting");
    tracing::info!(
        config = ?cli.config,
        port = config.port,
        static_mounts = config.static_dirs.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    Host::new(config).run().await?;
    Ok(())
}
