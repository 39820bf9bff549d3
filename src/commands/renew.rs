//! Renew command.

use std::time::Duration;

use clap::Args;

use crate::output;
use lockward::Lockward;
use lockward_core::error::AppError;
use lockward_core::types::HolderId;

/// Arguments for the renew command
#[derive(Debug, Args)]
pub struct RenewArgs {
    /// Resource key
    pub resource: String,
    /// Holder ID printed when the lock was acquired
    pub holder_id: String,
    /// New TTL in seconds (defaults to lock.default_ttl_seconds)
    #[arg(long)]
    pub ttl_secs: Option<u64>,
}

/// Execute the renew command
pub async fn execute(args: &RenewArgs, lockward: &Lockward) -> Result<(), AppError> {
    let holder = HolderId::new(args.holder_id.as_str());
    let ttl = args
        .ttl_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| lockward.locks().config().default_ttl());

    if lockward.locks().renew(&args.resource, &holder, ttl).await? {
        output::print_success(&format!(
            "Renewed '{}' for {} s",
            args.resource,
            ttl.as_secs()
        ));
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "'{}' is no longer held by {}",
            args.resource, holder
        )))
    }
}
