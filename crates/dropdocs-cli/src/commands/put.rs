//! Put command - upload stdin or a local file to a document.
//!
//! # Examples
//!
//! ```bash
//! # Upload a local file
//! dropdocs put notes.txt --from ~/notes.txt
//!
//! # Append stdin to an existing document
//! echo "another line" | dropdocs put /log.txt --append
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args as ClapArgs;
use dropdocs_provider::OpenMode;
use dropdocs_remote::RemoteEntry;
use tracing::instrument;

use super::{Context, normalize_path};
use crate::output::format_size;

#[derive(ClapArgs)]
pub struct Args {
    /// Destination document path
    pub path: String,

    /// Read content from a local file instead of stdin
    #[arg(long, value_name = "FILE")]
    pub from: Option<PathBuf>,

    /// Append to the existing document instead of replacing it
    #[arg(short, long)]
    pub append: bool,
}

#[instrument(level = "info", name = "cmd::put", skip_all, fields(path = %args.path, append = args.append))]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);
    let mut source: Box<dyn Read> = match &args.from {
        Some(file) => Box::new(
            File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
        ),
        None => Box::new(io::stdin().lock()),
    };

    let mode = if args.append {
        OpenMode::WriteAppend
    } else {
        OpenMode::WriteTruncate
    };
    let provider = ctx.provider()?;
    let mut handle = provider.open_for_write(&path, mode)?;
    io::copy(&mut source, &mut handle)?;
    let entry = handle.close()?;

    if let RemoteEntry::File(file) = entry {
        eprintln!("Uploaded {} ({})", file.path, format_size(file.size));
    }
    Ok(())
}
