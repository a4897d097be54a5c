use anyhow::Result;
use clap::Args as ClapArgs;
use dropdocs_provider::ROOT_ID;
use tracing::instrument;

use super::{Context, LISTING_COLUMNS, document_rows, print_documents};

#[derive(ClapArgs)]
pub struct Args {
    /// Show detailed information
    #[arg(short, long)]
    pub long: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::recent", skip_all)]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let provider = ctx.provider()?;
    let cursor = provider.query_recent_documents(ROOT_ID, Some(LISTING_COLUMNS))?;
    print_documents(&document_rows(&cursor), args.json, args.long)
}
