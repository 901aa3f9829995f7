//! Write command - write stdin to a file.
//!
//! # Examples
//!
//! ```bash
//! echo "hello" | hapifs write /shares/Finance/notes.txt
//! echo "more" | hapifs write --append /shares/Finance/notes.txt
//! ```

use std::io::{self, Read};

use anyhow::{Result, bail};
use bytes::Bytes;
use clap::Args as ClapArgs;
use tracing::instrument;

use hapifs_provider::ErrorCode;

use crate::host::Host;

#[derive(ClapArgs)]
pub struct Args {
    /// Path to the file (created if missing)
    pub path: String,

    /// Byte offset to write at
    #[arg(long, default_value_t = 0, conflicts_with = "append")]
    pub offset: u64,

    /// Write after the current end of the file
    #[arg(short, long)]
    pub append: bool,
}

#[instrument(level = "info", name = "cmd::write", skip_all, fields(path = %args.path))]
pub async fn execute(host: &Host, args: &Args) -> Result<()> {
    let mut data = Vec::new();
    io::stdin().read_to_end(&mut data)?;

    let offset = if args.append {
        match host.stat(&args.path).await {
            Ok(metadata) if metadata.is_directory => bail!("{} is a directory", args.path),
            Ok(metadata) => metadata.size,
            Err(e) if e.downcast_ref::<ErrorCode>() == Some(&ErrorCode::NotFound) => 0,
            Err(e) => return Err(e),
        }
    } else {
        args.offset
    };

    host.write(&args.path, offset, Bytes::from(data)).await
}
