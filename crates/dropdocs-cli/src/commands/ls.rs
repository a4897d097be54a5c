//! List command - list the children of a folder.
//!
//! # Examples
//!
//! ```bash
//! # List the account root
//! dropdocs ls
//!
//! # List with details
//! dropdocs ls -l /Documents
//!
//! # Output as JSON for scripting
//! dropdocs ls --json / | jq '.[].id'
//! ```

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use super::{Context, LISTING_COLUMNS, document_rows, normalize_path, print_documents};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Folder path (default: root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Show detailed information
    #[arg(short, long)]
    pub long: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::ls", skip_all, fields(path = %args.path))]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);
    let provider = ctx.provider()?;
    let cursor = provider.query_child_documents(&path, Some(LISTING_COLUMNS))?;
    print_documents(&document_rows(&cursor), args.json, args.long)
}
