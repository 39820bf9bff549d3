//! CLI command definitions and dispatch.

pub mod acquire;
pub mod health;
pub mod release;
pub mod renew;
pub mod status;
pub mod throttle;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::output::OutputFormat;
use lockward::Lockward;
use lockward_core::config::LockwardConfig;
use lockward_core::error::AppError;

/// Lockward: distributed resource locks and throttles
#[derive(Debug, Parser)]
#[command(name = "lockward", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show whether a resource is locked and its remaining TTL
    Status(status::StatusArgs),
    /// Acquire a lock, hold it, then release it
    Acquire(acquire::AcquireArgs),
    /// Release a lock held by a given holder id
    Release(release::ReleaseArgs),
    /// Renew a lock held by a given holder id
    Renew(renew::RenewArgs),
    /// Take a throttle slot, hold it, then give it back
    Throttle(throttle::ThrottleArgs),
    /// Check storage connectivity
    Health,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: &LockwardConfig) -> Result<(), AppError> {
        let lockward = Lockward::connect(config).await?;
        match &self.command {
            Commands::Status(args) => status::execute(args, &lockward, self.format).await,
            Commands::Acquire(args) => acquire::execute(args, &lockward, self.format).await,
            Commands::Release(args) => release::execute(args, &lockward).await,
            Commands::Renew(args) => renew::execute(args, &lockward).await,
            Commands::Throttle(args) => throttle::execute(args, &lockward, self.format).await,
            Commands::Health => health::execute(&lockward, config, self.format).await,
        }
    }
}

/// Helper: token cancelled on Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}
