//! Roots command - show the account root the provider exposes.
//!
//! Prints nothing when logged out, mirroring what the host sees.

use anyhow::Result;
use clap::Args as ClapArgs;
use dropdocs_provider::{RootColumn, RootCursor};
use serde::Serialize;
use tracing::instrument;

use super::Context;
use crate::output::{create_table, format_optional_size};

#[derive(ClapArgs)]
pub struct Args {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output format for one root
#[derive(Serialize)]
struct RootInfo {
    root_id: String,
    title: String,
    summary: String,
    document_id: String,
    available_bytes: Option<i64>,
    flags: i64,
}

#[instrument(level = "info", name = "cmd::roots", skip_all)]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let provider = ctx.provider()?;
    let cursor = provider.query_roots(None)?;

    let roots: Vec<RootInfo> = (0..cursor.len())
        .map(|row| RootInfo {
            root_id: text(&cursor, row, RootColumn::RootId),
            title: text(&cursor, row, RootColumn::Title),
            summary: text(&cursor, row, RootColumn::Summary),
            document_id: text(&cursor, row, RootColumn::DocumentId),
            available_bytes: cursor.int(row, RootColumn::AvailableBytes),
            flags: cursor.int(row, RootColumn::Flags).unwrap_or(0),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&roots)?);
        return Ok(());
    }
    if roots.is_empty() {
        eprintln!("No roots (not logged in)");
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Root", "Title", "Account", "Available"]);
    for root in &roots {
        table.add_row(vec![
            root.root_id.clone(),
            root.title.clone(),
            root.summary.clone(),
            format_optional_size(root.available_bytes),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn text(cursor: &RootCursor, row: usize, column: RootColumn) -> String {
    cursor.text(row, column).unwrap_or_default().to_string()
}
