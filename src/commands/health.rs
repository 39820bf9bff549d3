//! Health check command.

use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use lockward::Lockward;
use lockward_core::config::LockwardConfig;
use lockward_core::error::AppError;

/// Health display row
#[derive(Debug, Serialize, Tabled)]
struct HealthRow {
    /// Storage
    storage: String,
    /// Wake Channel
    channel: String,
    /// Node ID
    node_id: u16,
    /// Healthy
    healthy: bool,
}

/// Execute the health command
pub async fn execute(
    lockward: &Lockward,
    config: &LockwardConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let healthy = lockward.health_check().await?;
    output::print_row(
        &HealthRow {
            storage: config.storage.provider.clone(),
            channel: config.channel.provider.clone(),
            node_id: config.id.node_id,
            healthy,
        },
        format,
    );
    if healthy {
        Ok(())
    } else {
        Err(AppError::service_unavailable("Lock storage did not answer"))
    }
}
