use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use hapifs_provider::ErrorCode;

use crate::host::Host;

#[derive(ClapArgs)]
pub struct Args {
    /// Path to remove
    pub path: String,

    /// Remove directories and their contents recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Ignore nonexistent paths
    #[arg(short, long)]
    pub force: bool,
}

#[instrument(level = "info", name = "cmd::rm", skip_all, fields(path = %args.path, recursive = args.recursive))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    let metadata = match host.stat(&args.path).await {
        Ok(metadata) => metadata,
        Err(e) if args.force && e.downcast_ref::<ErrorCode>() == Some(&ErrorCode::NotFound) => {
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if metadata.is_directory && !args.recursive {
        bail!("{} is a directory (use -r to remove it)", args.path);
    }
    host.remove(&args.path).await
}
