//! Lock status command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use lockward::{LockStatus, Lockward};
use lockward_core::error::AppError;

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Resource key
    pub resource: String,
}

/// Status display row
#[derive(Debug, Serialize, Tabled)]
struct StatusRow {
    /// Resource
    resource: String,
    /// Locked
    locked: String,
    /// Remaining TTL
    ttl: String,
}

impl From<&LockStatus> for StatusRow {
    fn from(status: &LockStatus) -> Self {
        Self {
            resource: status.resource.clone(),
            locked: if status.locked { "✓" } else { "✗" }.to_string(),
            ttl: output::millis_cell(status.ttl_ms),
        }
    }
}

/// Execute the status command
pub async fn execute(
    args: &StatusArgs,
    lockward: &Lockward,
    format: OutputFormat,
) -> Result<(), AppError> {
    let status = lockward.locks().status(&args.resource).await?;
    match format {
        OutputFormat::Table => output::print_row(&StatusRow::from(&status), format),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&status)?;
            println!("{}", json);
        }
    }
    Ok(())
}
