use anyhow::Result;
use clap::Args as ClapArgs;
use dropdocs_provider::MIME_TYPE_DIR;
use tracing::instrument;

use super::{Context, normalize_path, split_parent};

#[derive(ClapArgs)]
pub struct Args {
    /// Path of the folder to create
    pub path: String,
}

#[instrument(level = "info", name = "cmd::mkdir", skip_all, fields(path = %args.path))]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);
    let (parent, name) = split_parent(&path)?;
    let provider = ctx.provider()?;
    let id = provider.create_document(parent, MIME_TYPE_DIR, name)?;
    println!("{id}");
    Ok(())
}
