//! Lockward CLI entry point.
//!
//! Loads configuration, installs logging, and runs one lock or throttle
//! command against the configured storage and wake channel.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use lockward_core::config::LockwardConfig;
use lockward_core::error::AppError;

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = cli.execute(&config).await {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}

/// Load configuration from file, environment overlay, and `LOCKWARD__*`
/// variables.
fn load_configuration(config_path: &str) -> Result<LockwardConfig, AppError> {
    let env = std::env::var("LOCKWARD_ENV").ok();
    LockwardConfig::load(config_path, env.as_deref())
}

/// Initialize tracing/logging. `RUST_LOG` wins over the configured level.
fn init_logging(config: &LockwardConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
