use anyhow::Result;
use clap::Args as ClapArgs;
use dropdocs_provider::ProviderError;
use tracing::instrument;

use super::{Context, normalize_path};

#[derive(ClapArgs)]
pub struct Args {
    /// Path to remove (folders are removed with their contents)
    pub path: String,

    /// Ignore nonexistent documents
    #[arg(short, long)]
    pub force: bool,
}

#[instrument(level = "info", name = "cmd::rm", skip_all, fields(path = %args.path))]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);
    let provider = ctx.provider()?;

    match provider.delete_document(&path) {
        Ok(()) => Ok(()),
        Err(ProviderError::RemoteNotFound(_)) if args.force => Ok(()),
        Err(e) => Err(e.into()),
    }
}
