//! Release command.

use clap::Args;

use crate::output;
use lockward::Lockward;
use lockward_core::error::AppError;
use lockward_core::types::HolderId;

/// Arguments for the release command
#[derive(Debug, Args)]
pub struct ReleaseArgs {
    /// Resource key
    pub resource: String,
    /// Holder ID printed when the lock was acquired
    pub holder_id: String,
}

/// Execute the release command
pub async fn execute(args: &ReleaseArgs, lockward: &Lockward) -> Result<(), AppError> {
    let holder = HolderId::new(args.holder_id.as_str());
    if lockward.locks().release(&args.resource, &holder).await? {
        output::print_success(&format!("Released '{}'", args.resource));
    } else {
        output::print_warning(&format!(
            "'{}' is not held by {}; nothing to release",
            args.resource, holder
        ));
    }
    Ok(())
}
