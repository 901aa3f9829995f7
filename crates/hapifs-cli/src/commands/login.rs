//! Login command - authenticate against a gatekeeper and store the session.
//!
//! # Examples
//!
//! ```bash
//! # Prompt for the password
//! hapifs login https://gatekeeper.example.com --user alice
//!
//! # Gatekeeper and user from config.toml, password from a secret manager
//! echo "$SECRET" | hapifs --password-stdin login
//! ```

use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use secrecy::SecretString;
use tracing::instrument;

use crate::config::Defaults;
use crate::host::Host;

#[derive(ClapArgs)]
pub struct Args {
    /// Gatekeeper base URL (default: `gatekeeper` from config.toml)
    pub gatekeeper: Option<String>,

    /// User name (default: `user` from config.toml)
    #[arg(short, long)]
    pub user: Option<String>,
}

#[instrument(level = "info", name = "cmd::login", skip_all)]
pub async fn execute(
    host: &Host,
    args: &Args,
    defaults: &Defaults,
    password: impl FnOnce() -> Result<String>,
) -> Result<()> {
    let Some(gatekeeper) = args.gatekeeper.as_ref().or(defaults.gatekeeper.as_ref()) else {
        bail!("No gatekeeper given. Pass one or set `gatekeeper` under [defaults] in config.toml");
    };
    let Some(user) = args.user.as_ref().or(defaults.user.as_ref()) else {
        bail!("No user given. Pass --user or set `user` under [defaults] in config.toml");
    };

    let secret = SecretString::from(password()?);
    host.login(gatekeeper, user, secret).await?;

    let status = host.adapter().status();
    let name = status.display_name.unwrap_or_else(|| user.clone());
    println!("Logged in to {gatekeeper} as {name}");
    Ok(())
}
