use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use dropdocs_provider::ROOT_ID;
use tracing::instrument;

use super::{Context, LISTING_COLUMNS, document_rows, print_documents};

#[derive(ClapArgs)]
pub struct Args {
    /// Text to look for in file names (case-insensitive)
    pub query: String,

    /// Show detailed information
    #[arg(short, long)]
    pub long: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::search", skip_all, fields(query = %args.query))]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    if args.query.is_empty() {
        bail!("Search query is empty");
    }
    let provider = ctx.provider()?;
    let cursor = provider.query_search_documents(ROOT_ID, &args.query, Some(LISTING_COLUMNS))?;
    print_documents(&document_rows(&cursor), args.json, args.long)
}
