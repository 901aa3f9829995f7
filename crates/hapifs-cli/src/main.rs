mod commands;
mod config;
mod exit_code;
mod host;
mod output;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hapifs_provider::{ErrorCode, GatewayError, HostError, ProviderError};

use crate::commands::{cat, cp, login, logout, ls, mkdir, mv, rm, stat, status, touch, truncate, write};
use crate::config::Config;
use crate::host::{Host, NOT_LOGGED_IN};

/// Command-line host for HAPI gatekeeper file stores
#[derive(Parser)]
#[command(name = "hapifs")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Log in once; later commands resume the stored session
    hapifs login https://gatekeeper.example.com --user alice

    # Browse shares and managed computers
    hapifs ls /shares
    hapifs ls -l /computers/LAPTOP/home

    # Read and write files
    hapifs cat /shares/Finance/budget.txt
    echo \"draft\" | hapifs write /shares/Finance/notes.txt

    # Forget the stored session
    hapifs logout
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Gatekeeper password for `login` (insecure, prefer --password-stdin or HAPIFS_PASSWORD)
    #[arg(long, env = "HAPIFS_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Read the password from stdin (single line)
    #[arg(long, conflicts_with = "password", global = true)]
    password_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Password options extracted from the CLI for `login`
#[derive(Clone, Default)]
struct PasswordOptions {
    password: Option<String>,
    password_stdin: bool,
}

impl From<&Cli> for PasswordOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            password: cli.password.clone(),
            password_stdin: cli.password_stdin,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    // ============ Session ============
    /// Log in to a gatekeeper and store the session
    Login(login::Args),

    /// Forget the stored session and cached tree
    Logout(logout::Args),

    /// Show the current session
    Status(status::Args),

    // ============ File operations (require a stored session) ============
    /// List directory contents
    Ls(ls::Args),

    /// Show metadata for a path
    Stat(stat::Args),

    /// Print file contents
    Cat(cat::Args),

    /// Write stdin to a file
    Write(write::Args),

    /// Create a directory
    Mkdir(mkdir::Args),

    /// Create an empty file
    Touch(touch::Args),

    /// Remove a file or directory
    Rm(rm::Args),

    /// Copy a file or directory
    Cp(cp::Args),

    /// Move or rename a file or directory
    Mv(mv::Args),

    /// Set the length of a file
    Truncate(truncate::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let config = Config::load()?;
    let password_opts = PasswordOptions::from(&cli);
    let host = Host::open(&config)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(async {
        match cli.command {
            Commands::Login(args) => {
                login::execute(&host, &args, &config.defaults, || get_password(&password_opts)).await
            }
            Commands::Logout(args) => logout::execute(&host, &args),
            Commands::Status(args) => status::execute(&host, &args).await,
            command => {
                host.connect().await?;
                execute_file_command(&host, command).await
            }
        }
    });
    host.sync_cache();
    result
}

/// Execute a command that needs a resumed session
async fn execute_file_command(host: &Host, command: Commands) -> Result<()> {
    match command {
        Commands::Ls(args) => ls::execute(host, &args).await,
        Commands::Stat(args) => stat::execute(host, &args).await,
        Commands::Cat(args) => cat::execute(host, &args).await,
        Commands::Write(args) => write::execute(host, &args).await,
        Commands::Mkdir(args) => mkdir::execute(host, &args).await,
        Commands::Touch(args) => touch::execute(host, &args).await,
        Commands::Rm(args) => rm::execute(host, &args).await,
        Commands::Cp(args) => cp::execute(host, &args).await,
        Commands::Mv(args) => mv::execute(host, &args).await,
        Commands::Truncate(args) => truncate::execute(host, &args).await,
        Commands::Login(_) | Commands::Logout(_) | Commands::Status(_) => {
            unreachable!("session commands are handled before resuming")
        }
    }
}

/// Get the password using the priority chain:
/// 1. --password-stdin
/// 2. --password / HAPIFS_PASSWORD
/// 3. Interactive prompt
fn get_password(opts: &PasswordOptions) -> Result<String> {
    if opts.password_stdin {
        read_password_from_stdin()
    } else if let Some(ref password) = opts.password {
        Ok(password.clone())
    } else {
        rpassword::prompt_password("Password: ").context("Failed to read password")
    }
}

/// Read password from stdin (first line only)
fn read_password_from_stdin() -> Result<String> {
    if io::stdin().is_terminal() {
        anyhow::bail!(
            "--password-stdin requires the password to be piped in.\n\
             Example: echo \"$SECRET\" | hapifs --password-stdin login"
        );
    }

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    let password = password.trim_end_matches('\n').trim_end_matches('\r');

    if password.is_empty() {
        anyhow::bail!("Password from stdin is empty");
    }

    Ok(password.to_string())
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        // Codes delivered through the host callbacks
        if let Some(code) = cause.downcast_ref::<ErrorCode>() {
            return match code {
                ErrorCode::NotFound => exit_code::NOT_FOUND,
                ErrorCode::AccessDenied => exit_code::PERMISSION_DENIED,
                ErrorCode::Exists => exit_code::EXISTS,
                ErrorCode::InUse => exit_code::IN_USE,
                ErrorCode::Abort => exit_code::AUTH_FAILED,
                ErrorCode::Failed => exit_code::GENERAL_ERROR,
            };
        }

        if let Some(gateway_err) = cause.downcast_ref::<GatewayError>() {
            match gateway_err {
                GatewayError::InvalidGatekeeper(_) => return exit_code::USAGE_ERROR,
                GatewayError::Authentication(_) => return exit_code::AUTH_FAILED,
                GatewayError::Status(403) => return exit_code::PERMISSION_DENIED,
                _ => {}
            }
        }

        if let Some(provider_err) = cause.downcast_ref::<ProviderError>()
            && matches!(
                provider_err,
                ProviderError::NotAuthenticated | ProviderError::RecoveryAborted
            )
        {
            return exit_code::AUTH_FAILED;
        }

        if cause.downcast_ref::<HostError>().is_some() {
            return exit_code::MOUNT_FAILED;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::PermissionDenied => return exit_code::PERMISSION_DENIED,
                io::ErrorKind::NotFound => return exit_code::NOT_FOUND,
                io::ErrorKind::Interrupted => return exit_code::CANCELLED,
                _ => {}
            }
        }
    }

    // Fallback to string matching for errors without a typed source
    let msg = format!("{e:#}");
    if msg.contains(NOT_LOGGED_IN) {
        exit_code::AUTH_FAILED
    } else if msg.to_lowercase().contains("interrupted") {
        exit_code::CANCELLED
    } else {
        exit_code::GENERAL_ERROR
    }
}
