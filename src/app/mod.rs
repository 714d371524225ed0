pub mod config;
pub mod logging;
pub mod service;
pub mod shutdown;

pub use config::{Config, ConfigError, LogFormat, LogLevel};
pub use logging::{LoggingError, LoggingSystem, setup_logging};
pub use service::{InboundEvent, RelayService, ServiceError};
pub use shutdown::{TerminationSignal, wait_for_termination_signal};

use clap::Parser;
use std::process;
use tokio::io::BufReader;
use tracing::{error, info};

pub struct App {
    config: Config,
    service: RelayService,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        // A config file replaces the command line entirely
        let final_config = if let Some(config_file) = &config.config_file {
            eprintln!("Loading configuration from file: {}", config_file.display());
            Config::from_file(config_file)?
        } else {
            config
        };

        if let Err(e) = setup_logging(final_config.log_level, final_config.log_format) {
            eprintln!("Warning: {e}");
        }

        info!("Starting pixel-relay v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "Configuration: endpoint={}, batch_interval={:?}, heartbeat_interval={:?}, debug={}",
            final_config.endpoint,
            final_config.batch_interval,
            final_config.heartbeat_interval,
            final_config.debug
        );

        let service = RelayService::new(&final_config)?;
        Ok(Self {
            config: final_config,
            service,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("pixel-relay is reading events from stdin. Press Ctrl+C to stop.");

        let outcome = self.service.run(BufReader::new(tokio::io::stdin())).await?;

        info!(?outcome, "pixel-relay stopped.");
        Ok(())
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Main entry point for the application
pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && (args[1] == "--version" || args[1] == "-V") {
        println!("pixel-relay {}", get_version());
        return Ok(());
    }

    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        Config::parse_from(["pixel-relay", "--help"]);
        return Ok(());
    }

    match App::from_args(args) {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("Application error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    }

    Ok(())
}
