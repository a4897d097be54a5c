//! Status command - show login state and where things are stored.
//!
//! Never touches the network.

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use super::Context;
use crate::output::create_table;

#[derive(ClapArgs)]
pub struct Args {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output format for status command
#[derive(Serialize)]
struct StatusOutput {
    logged_in: bool,
    config_dir: String,
    credential_file: String,
    spool_dir: String,
    title: String,
}

#[instrument(level = "info", name = "cmd::status", skip_all)]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let provider = &ctx.config.provider;
    let status = StatusOutput {
        logged_in: ctx.session().is_logged_in(),
        config_dir: ctx.config_dir.display().to_string(),
        credential_file: ctx.store.path().display().to_string(),
        spool_dir: provider.spool_dir.display().to_string(),
        title: provider.title.clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let mut table = create_table();
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec![
            "Logged In",
            if status.logged_in { "yes" } else { "no" },
        ]);
        table.add_row(vec!["Root Title", &status.title]);
        table.add_row(vec!["Config Dir", &status.config_dir]);
        table.add_row(vec!["Credential File", &status.credential_file]);
        table.add_row(vec!["Spool Dir", &status.spool_dir]);
        println!("{table}");
    }
    Ok(())
}
