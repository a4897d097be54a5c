use std::io::{self, Write};

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use super::{Context, normalize_path};

#[derive(ClapArgs)]
pub struct Args {
    /// Document path
    pub file: String,
}

#[instrument(level = "info", name = "cmd::cat", skip_all, fields(file = %args.file))]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let path = normalize_path(&args.file);
    let provider = ctx.provider()?;
    let mut handle = provider.open_for_read(&path)?;
    let mut stdout = io::stdout().lock();
    io::copy(&mut handle, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}
