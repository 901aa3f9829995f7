use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::host::Host;

#[derive(ClapArgs)]
pub struct Args {
    /// Path to the file to create
    pub path: String,
}

#[instrument(level = "info", name = "cmd::touch", skip_all, fields(path = %args.path))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    host.touch(&args.path).await
}
