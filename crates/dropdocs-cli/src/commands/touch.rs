use anyhow::Result;
use clap::Args as ClapArgs;
use dropdocs_provider::item::mime_type_for_name;
use tracing::instrument;

use super::{Context, normalize_path, split_parent};

#[derive(ClapArgs)]
pub struct Args {
    /// Path of the document to create
    pub path: String,

    /// MIME type (guessed from the extension when omitted)
    #[arg(long)]
    pub mime_type: Option<String>,
}

#[instrument(level = "info", name = "cmd::touch", skip_all, fields(path = %args.path))]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);
    let (parent, name) = split_parent(&path)?;
    let mime_type = args
        .mime_type
        .clone()
        .unwrap_or_else(|| mime_type_for_name(name));

    let provider = ctx.provider()?;
    let id = provider.create_document(parent, &mime_type, name)?;
    println!("{id}");
    Ok(())
}
