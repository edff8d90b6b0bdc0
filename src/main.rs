//! # Region Price Scout Main Driver
//!
//! ## Purpose
//! Main entry point for the region pricing server. Orchestrates component
//! initialization and starts the web server for handling pricing requests.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files, command line arguments, environment variables
//! - **Output**: Running web server with pricing API endpoints
//! - **Initialization**: Loads the geography index, opens the price store, wires caches
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Build the pricing engine (geography index, store, live client, caches)
//! 4. Start web API server
//! 5. Handle shutdown signals gracefully

use clap::{Arg, Command};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use region_price_scout::{
    api::ApiServer, config::Config, engine::PricingEngine, errors::PricingError, errors::Result,
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("region-price-scout")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cloud region VM pricing aggregation service")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("check-health")
                .long("check-health")
                .help("Validate configuration and required paths, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    let config = Arc::new(config);

    init_logging(&config)?;
    info!("Starting Region Price Scout v{}", env!("CARGO_PKG_VERSION"));

    if matches.get_flag("check-health") {
        return run_health_checks(&config);
    }

    let app_state = initialize_components(config.clone())?;

    let server = ApiServer::new(app_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    info!(
        "Region Price Scout listening on {}:{}",
        config.server.host, config.server.port
    );

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = server_handle => {
            warn!("Server stopped unexpectedly");
        }
    }

    info!("Region Price Scout shut down successfully");
    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let log_level: tracing::Level =
        config
            .logging
            .level
            .parse()
            .map_err(|_| PricingError::Config {
                message: format!("Invalid log level: {}", config.logging.level),
            })?;

    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
                log_level,
            )),
    );
    subscriber.init();

    info!("Logging initialized with level: {}", config.logging.level);
    Ok(())
}

/// Build the pricing engine and wrap it in shared application state
fn initialize_components(config: Arc<Config>) -> Result<AppState> {
    info!("Initializing pricing engine...");
    let engine = Arc::new(PricingEngine::from_config(&config)?);
    info!(
        "Pricing engine ready with {} regions in scope",
        engine.region_count()
    );

    Ok(AppState { config, engine })
}

/// Validate configuration and required paths without starting the server
fn run_health_checks(config: &Config) -> Result<()> {
    config.validate()?;
    info!("✓ Configuration is valid");

    if let Some(parent) = config.store.path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
            info!("Created directory: {:?}", parent);
        }
    }
    info!("✓ Price store path is accessible");

    let engine = PricingEngine::from_config(config)?;
    info!("✓ Pricing engine builds ({} regions)", engine.region_count());

    info!("All health checks passed!");
    Ok(())
}
