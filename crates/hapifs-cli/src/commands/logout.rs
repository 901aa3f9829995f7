use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::host::Host;

#[derive(ClapArgs)]
pub struct Args {}

/// Forget the stored credentials and the cached tree. Safe to repeat.
#[instrument(level = "info", name = "cmd::logout", skip_all)]
pub fn execute(host: &Host, _args: &Args) -> Result<()> {
    host.adapter().logout();
    println!("Logged out");
    Ok(())
}
