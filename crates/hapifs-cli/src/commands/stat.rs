use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::host::Host;
use crate::output::{create_table, format_size, format_time};

#[derive(ClapArgs)]
pub struct Args {
    /// Virtual path
    pub path: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::stat", skip_all, fields(path = %args.path))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    let metadata = host.stat(&args.path).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    let mut table = create_table();
    table.add_row(vec!["Name", metadata.name.as_str()]);
    table.add_row(vec![
        "Type",
        if metadata.is_directory { "directory" } else { "file" },
    ]);
    table.add_row(vec![
        "Size".to_string(),
        format!("{} ({} bytes)", format_size(metadata.size), metadata.size),
    ]);
    table.add_row(vec![
        "Modified".to_string(),
        format_time(&metadata.modification_time),
    ]);
    println!("{table}");
    Ok(())
}
