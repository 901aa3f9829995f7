use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use hapifs_provider::vpath;

use crate::host::Host;

/// Shallowest depth at which directories can be created (`/shares/<share>/<dir>`).
const FIRST_CREATABLE_DEPTH: usize = 3;

#[derive(ClapArgs)]
pub struct Args {
    /// Directory path to create
    pub path: String,

    /// Create parent directories as needed
    #[arg(short, long)]
    pub parents: bool,
}

#[instrument(level = "info", name = "cmd::mkdir", skip_all, fields(path = %args.path, parents = args.parents))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    let path = vpath::normalize(&args.path);
    if !args.parents {
        return host.mkdir(&path).await;
    }

    let segments = vpath::segments(&path);
    for depth in FIRST_CREATABLE_DEPTH..=segments.len() {
        let prefix = format!("/{}", segments[..depth].join("/"));
        if let Some(parent) = vpath::parent(&prefix) {
            host.list(parent).await?;
        }
        if !host.adapter().cache().contains(&prefix) {
            host.mkdir(&prefix).await?;
        }
    }
    Ok(())
}
