use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use super::{Context, normalize_path};

#[derive(ClapArgs)]
pub struct Args {
    /// Image document path
    pub path: String,

    /// Write the JPEG here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Requested width in pixels
    #[arg(long, default_value_t = 256)]
    pub width: u32,

    /// Requested height in pixels
    #[arg(long, default_value_t = 256)]
    pub height: u32,
}

#[instrument(level = "info", name = "cmd::thumb", skip_all, fields(path = %args.path))]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);
    let provider = ctx.provider()?;
    let mut asset = provider.open_document_thumbnail(&path, (args.width, args.height))?;

    let written = match &args.output {
        Some(output) => {
            let mut file = File::create(output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            io::copy(&mut asset, &mut file)?
        }
        None => io::copy(&mut asset, &mut io::stdout().lock())?,
    };
    tracing::debug!("wrote {} thumbnail bytes", written);
    Ok(())
}
