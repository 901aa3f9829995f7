use std::io::{self, Write};

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::host::Host;

#[derive(ClapArgs)]
pub struct Args {
    /// Virtual path of the file
    pub file: String,
}

#[instrument(level = "info", name = "cmd::cat", skip_all, fields(file = %args.file))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    let content = host.read_all(&args.file).await?;
    io::stdout().write_all(&content)?;
    Ok(())
}
