//! Throttle slot command.

use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use lockward::{Lockward, ThrottleOptions};
use lockward_core::error::AppError;

/// Arguments for the throttle command
#[derive(Debug, Args)]
pub struct ThrottleArgs {
    /// Resource key
    pub resource: String,
    /// Slots allowed per window (defaults to throttle.default_limit)
    #[arg(long)]
    pub limit: Option<u64>,
    /// Window length in seconds (defaults to throttle.window_seconds)
    #[arg(long)]
    pub window_secs: Option<u64>,
    /// Acquisition timeout in milliseconds (defaults to throttle.acquire_timeout_ms)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// How long to hold the slot before giving it back
    #[arg(long, default_value_t = 0)]
    pub hold_ms: u64,
}

/// Throttle slot display row
#[derive(Debug, Serialize, Tabled)]
struct SlotRow {
    /// Resource
    resource: String,
    /// Slot
    slot: u64,
    /// Limit
    limit: u64,
    /// Waited
    waited_ms: u64,
}

/// Execute the throttle command
pub async fn execute(
    args: &ThrottleArgs,
    lockward: &Lockward,
    format: OutputFormat,
) -> Result<(), AppError> {
    let throttles = lockward.throttles();
    let limit = args.limit.unwrap_or(throttles.config().default_limit);
    let cancel = super::cancel_on_ctrl_c();

    let mut options = ThrottleOptions::new().limit(limit).cancel(cancel.clone());
    if let Some(window) = args.window_secs {
        options = options.window(Duration::from_secs(window));
    }
    if let Some(timeout) = args.timeout_ms {
        options = options.acquire_timeout(Duration::from_millis(timeout));
    }

    let Some(handle) = throttles.try_acquire(&args.resource, options).await? else {
        output::print_warning(&format!(
            "All {} slots of '{}' are taken",
            limit, args.resource
        ));
        return Ok(());
    };
    output::print_row(
        &SlotRow {
            resource: handle.resource().to_string(),
            slot: handle.slot(),
            limit,
            waited_ms: u64::try_from(handle.waited().as_millis()).unwrap_or(u64::MAX),
        },
        format,
    );

    if args.hold_ms > 0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(args.hold_ms)) => {}
            _ = cancel.cancelled() => output::print_warning("Interrupted; releasing early"),
        }
    }

    if let Some(remaining) = handle.release().await? {
        output::print_success(&format!(
            "Released slot of '{}' ({} still taken)",
            args.resource, remaining
        ));
    }
    Ok(())
}
