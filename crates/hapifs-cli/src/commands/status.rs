//! Status command - show the session, resuming it from stored credentials.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use hapifs_provider::SessionPhase;

use crate::host::Host;
use crate::output::create_table;

#[derive(ClapArgs)]
pub struct Args {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusOutput {
    logged_in: bool,
    gatekeeper: Option<String>,
    user: Option<String>,
    principal: Option<String>,
    display_name: Option<String>,
    mounted: bool,
    cached_entries: usize,
}

#[instrument(level = "info", name = "cmd::status", skip_all)]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    host.adapter()
        .resume()
        .await
        .context("Failed to resume stored session")?;
    let status = host.adapter().status();

    let output = StatusOutput {
        logged_in: status.phase == SessionPhase::LoggedIn,
        gatekeeper: status.gatekeeper_url,
        user: status.user,
        principal: status.principal,
        display_name: status.display_name,
        mounted: host.is_mounted(),
        cached_entries: host.adapter().cache().len(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if !output.logged_in {
        println!("Not logged in");
        return Ok(());
    }

    let unknown = || "-".to_string();
    let mut table = create_table();
    table.add_row(vec!["Gatekeeper".to_string(), output.gatekeeper.unwrap_or_else(unknown)]);
    table.add_row(vec!["User".to_string(), output.user.unwrap_or_else(unknown)]);
    table.add_row(vec!["Display name".to_string(), output.display_name.unwrap_or_else(unknown)]);
    table.add_row(vec!["Principal".to_string(), output.principal.unwrap_or_else(unknown)]);
    table.add_row(vec!["Mounted".to_string(), output.mounted.to_string()]);
    table.add_row(vec!["Cached entries".to_string(), output.cached_entries.to_string()]);
    println!("{table}");
    Ok(())
}
