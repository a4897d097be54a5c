#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;
mod output;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dropdocs_provider::ProviderError;
use dropdocs_remote::RemoteError;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    Context, cat, login, logout, ls, mkdir, put, recent, rm, roots, search, stat, status, thumb,
    touch,
};
use crate::config::ConfigError;

/// Browse and edit a Dropbox account through the dropdocs document provider
#[derive(Parser)]
#[command(name = "dropdocs")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Authorize with your app key (prints a URL, then asks for the code)
    dropdocs login --app-key abc123xyz

    # List the account root
    dropdocs ls -l /

    # Most recently modified files
    dropdocs recent

    # Upload a file, then read it back
    dropdocs put /notes/todo.txt --from todo.txt
    dropdocs cat /notes/todo.txt

Configuration lives in ~/.config/dropdocs/config.toml (override the directory
with DROPDOCS_CONFIG_DIR).
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ============ Account ============

    /// Authorize access to a Dropbox account
    Login(login::Args),

    /// Forget the stored credential
    Logout(logout::Args),

    /// Show login state and storage locations (offline)
    Status(status::Args),

    /// Show the account root exposed to the host
    Roots(roots::Args),

    // ============ Queries ============

    /// List folder contents
    Ls(ls::Args),

    /// Show metadata of one document
    Stat(stat::Args),

    /// List the most recently modified files
    Recent(recent::Args),

    /// Find files by name
    Search(search::Args),

    // ============ Transfers ============

    /// Write a document to stdout
    Cat(cat::Args),

    /// Upload stdin or a local file to a document
    Put(put::Args),

    /// Fetch a thumbnail of an image document
    Thumb(thumb::Args),

    // ============ Changes ============

    /// Create an empty document
    Touch(touch::Args),

    /// Create a folder
    Mkdir(mkdir::Args),

    /// Delete a document or folder
    Rm(rm::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            // Only print error if not quiet mode (quiet is parsed separately for this)
            let is_quiet = std::env::args().any(|a| a == "-q" || a == "--quiet");
            if !is_quiet {
                eprintln!("Error: {e:#}");
                if code == exit_code::AUTH_FAILED {
                    eprintln!("Run `dropdocs login` to authorize access.");
                }
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

    let ctx = Context::load()?;

    match cli.command {
        Commands::Login(args) => login::execute(&ctx, &args),
        Commands::Logout(args) => logout::execute(&ctx, &args),
        Commands::Status(args) => status::execute(&ctx, &args),
        Commands::Roots(args) => roots::execute(&ctx, &args),
        Commands::Ls(args) => ls::execute(&ctx, &args),
        Commands::Stat(args) => stat::execute(&ctx, &args),
        Commands::Recent(args) => recent::execute(&ctx, &args),
        Commands::Search(args) => search::execute(&ctx, &args),
        Commands::Cat(args) => cat::execute(&ctx, &args),
        Commands::Put(args) => put::execute(&ctx, &args),
        Commands::Thumb(args) => thumb::execute(&ctx, &args),
        Commands::Touch(args) => touch::execute(&ctx, &args),
        Commands::Mkdir(args) => mkdir::execute(&ctx, &args),
        Commands::Rm(args) => rm::execute(&ctx, &args),
    }
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
        if let Some(provider_err) = cause.downcast_ref::<ProviderError>() {
            return match provider_err {
                err if err.needs_login() => exit_code::AUTH_FAILED,
                ProviderError::RemoteNotFound(_) => exit_code::NOT_FOUND,
                ProviderError::RemoteConflict(_) => exit_code::CONFLICT,
                ProviderError::LocalIo(io_err) => io_exit_code(io_err),
                ProviderError::InvalidArgument(_) => exit_code::GENERAL_ERROR,
                _ => exit_code::TRANSFER_FAILED,
            };
        }

        if let Some(remote_err) = cause.downcast_ref::<RemoteError>() {
            return match remote_err {
                err if err.is_auth() => exit_code::AUTH_FAILED,
                RemoteError::NotFound(_) => exit_code::NOT_FOUND,
                RemoteError::Conflict { .. } => exit_code::CONFLICT,
                _ => exit_code::TRANSFER_FAILED,
            };
        }

        if cause.downcast_ref::<ConfigError>().is_some() {
            return exit_code::CONFIG_INVALID;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return io_exit_code(io_err);
        }
    }

    exit_code::GENERAL_ERROR
}

fn io_exit_code(e: &io::Error) -> u8 {
    match e.kind() {
        io::ErrorKind::PermissionDenied => exit_code::PERMISSION_DENIED,
        io::ErrorKind::NotFound => exit_code::NOT_FOUND,
        _ => exit_code::GENERAL_ERROR,
    }
}
