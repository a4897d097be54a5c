use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use super::{Context, LISTING_COLUMNS, document_rows, normalize_path};
use crate::output::{create_table, format_millis, format_optional_size};

#[derive(ClapArgs)]
pub struct Args {
    /// Document path
    pub path: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::stat", skip_all, fields(path = %args.path))]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);
    let provider = ctx.provider()?;
    let cursor = provider.query_document(&path, Some(LISTING_COLUMNS))?;
    let rows = document_rows(&cursor);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Property", "Value"]);
    for row in &rows {
        table.add_row(vec!["Path", &row.id]);
        table.add_row(vec!["Name", &row.name]);
        table.add_row(vec!["Type", &row.mime_type]);
        table.add_row(vec!["Size", &format_optional_size(row.size)]);
        table.add_row(vec!["Modified", &format_millis(row.last_modified)]);
        table.add_row(vec!["Writable", if row.is_writable() { "yes" } else { "no" }]);
    }
    println!("{table}");
    Ok(())
}
