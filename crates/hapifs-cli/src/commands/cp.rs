//! Copy command - server-side copy of a file or directory.
//!
//! The gatekeeper copies directories with their contents and overwrites an
//! existing target.
//!
//! # Examples
//!
//! ```bash
//! hapifs cp /shares/Finance/budget.txt /shares/Finance/Archive/budget.txt
//! hapifs cp /computers/LAPTOP/home/docs /computers/LAPTOP/home/docs-backup
//! ```

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

#[instrument(level = "info", name = "cmd::cp", skip_all, fields(source = %args.source, dest = %args.dest))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    host.copy(&args.source, &args.dest).await
}
