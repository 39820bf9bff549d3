//! Acquire-and-hold command.

use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use lockward::{AcquireOptions, LockHandle, Lockward};
use lockward_core::error::AppError;

/// Arguments for the acquire command
#[derive(Debug, Args)]
pub struct AcquireArgs {
    /// Resource key
    pub resource: String,
    /// Lock TTL in seconds (defaults to lock.default_ttl_seconds)
    #[arg(long)]
    pub ttl_secs: Option<u64>,
    /// Acquisition timeout in milliseconds (defaults to lock.acquire_timeout_ms)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// How long to hold the lock before releasing it
    #[arg(long, default_value_t = 0)]
    pub hold_ms: u64,
}

/// Acquired lock display row
#[derive(Debug, Serialize, Tabled)]
struct LockRow {
    /// Resource
    resource: String,
    /// Holder ID
    holder_id: String,
    /// Acquired At
    acquired_at: String,
    /// Waited
    waited_ms: u64,
    /// TTL
    ttl_secs: u64,
}

impl From<&LockHandle> for LockRow {
    fn from(handle: &LockHandle) -> Self {
        Self {
            resource: handle.resource().to_string(),
            holder_id: handle.holder_id().to_string(),
            acquired_at: handle.acquired_at().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            waited_ms: u64::try_from(handle.waited().as_millis()).unwrap_or(u64::MAX),
            ttl_secs: handle.ttl().as_secs(),
        }
    }
}

/// Execute the acquire command
pub async fn execute(
    args: &AcquireArgs,
    lockward: &Lockward,
    format: OutputFormat,
) -> Result<(), AppError> {
    let cancel = super::cancel_on_ctrl_c();
    let mut options = AcquireOptions::new().cancel(cancel.clone());
    if let Some(ttl) = args.ttl_secs {
        options = options.ttl(Duration::from_secs(ttl));
    }
    if let Some(timeout) = args.timeout_ms {
        options = options.acquire_timeout(Duration::from_millis(timeout));
    }

    let Some(handle) = lockward.locks().try_acquire(&args.resource, options).await? else {
        output::print_warning(&format!("'{}' is held by someone else", args.resource));
        return Ok(());
    };
    output::print_row(&LockRow::from(&handle), format);

    if args.hold_ms > 0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(args.hold_ms)) => {}
            _ = cancel.cancelled() => output::print_warning("Interrupted; releasing early"),
        }
    }

    if handle.release().await? {
        output::print_success(&format!("Released '{}'", args.resource));
    } else {
        output::print_warning(&format!("'{}' had already expired", args.resource));
    }
    Ok(())
}
