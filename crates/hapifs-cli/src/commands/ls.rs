//! List command - list a virtual directory.
//!
//! # Examples
//!
//! ```bash
//! # Top level: shares and computers
//! hapifs ls
//!
//! # With details
//! hapifs ls -l /shares/Finance
//!
//! # Output as JSON for scripting
//! hapifs ls --json /computers | jq '.entries[].name'
//! ```

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use hapifs_provider::EntryMetadata;

use crate::host::Host;
use crate::output::{create_table, format_entry_type, format_size, format_time};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Virtual directory (default: root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Show detailed information
    #[arg(short, long)]
    pub long: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// One entry per line (script-friendly)
    #[arg(short = '1')]
    pub one_per_line: bool,
}

/// JSON output format for ls command
#[derive(Serialize)]
struct LsOutput<'a> {
    path: &'a str,
    entries: &'a [EntryMetadata],
}

#[instrument(level = "info", name = "cmd::ls", skip_all, fields(path = %args.path))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    let mut entries = host.list(&args.path).await?;
    // Directories first, then by name.
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });

    if args.json {
        let output = LsOutput {
            path: &args.path,
            entries: &entries,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if args.long {
        print_long_format(&entries);
    } else {
        print_short_format(&entries, args.one_per_line);
    }

    Ok(())
}

fn print_long_format(entries: &[EntryMetadata]) {
    let mut table = create_table();
    table.set_header(vec!["Type", "Size", "Modified", "Name"]);

    for entry in entries {
        let (size, name) = if entry.is_directory {
            ("-".to_string(), format!("{}/", entry.name))
        } else {
            (format_size(entry.size), entry.name.clone())
        };
        table.add_row(vec![
            format_entry_type(entry.is_directory).to_string(),
            size,
            format_time(&entry.modification_time),
            name,
        ]);
    }

    println!("{table}");
}

fn print_short_format(entries: &[EntryMetadata], one_per_line: bool) {
    let names: Vec<String> = entries
        .iter()
        .map(|e| {
            if e.is_directory {
                format!("{}/", e.name)
            } else {
                e.name.clone()
            }
        })
        .collect();

    if one_per_line || names.len() > 10 {
        for name in names {
            println!("{name}");
        }
    } else if !names.is_empty() {
        println!("{}", names.join("  "));
    }
}
