use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::host::Host;

#[derive(ClapArgs)]
pub struct Args {
    /// Path to the file
    pub path: String,

    /// New length in bytes
    #[arg(short, long)]
    pub size: u64,
}

#[instrument(level = "info", name = "cmd::truncate", skip_all, fields(path = %args.path, size = args.size))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    host.truncate(&args.path, args.size).await
}
