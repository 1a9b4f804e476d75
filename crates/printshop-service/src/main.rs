//! Main entry point for the print shop order service.
//!
//! This binary loads the configuration, builds the order engine with the
//! configured storage and notification implementations, and serves the HTTP
//! API until interrupted.

use clap::Parser;
use printshop_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the print shop service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/printshop.toml", env = "PRINTSHOP_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Resolves once the process receives Ctrl+C.
async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for Ctrl+C: {}", e);
		std::future::pending::<()>().await;
	}
	tracing::info!("Received Ctrl+C, shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started print shop service");

	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.shop.id);

	let api_config = config.api_or_default();
	let engine = Arc::new(factory_registry::build_engine_from_config(config)?);

	if api_config.enabled {
		server::start_server(api_config, Arc::clone(&engine), shutdown_signal()).await?;
	} else {
		tracing::warn!("API server disabled in configuration, nothing to serve");
	}

	engine.shutdown().await?;
	tracing::info!("Stopped print shop service");
	Ok(())
}
