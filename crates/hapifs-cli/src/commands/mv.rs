use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::host::Host;

#[derive(ClapArgs)]
pub struct Args {
    /// Source path
    pub source: String,

    /// Destination path (full path, including the new name)
    pub dest: String,
}

#[instrument(level = "info", name = "cmd::mv", skip_all, fields(source = %args.source, dest = %args.dest))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    host.rename(&args.source, &args.dest).await
}
