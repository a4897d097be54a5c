use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use super::Context;

#[derive(ClapArgs)]
pub struct Args {}

#[instrument(level = "info", name = "cmd::logout", skip_all)]
pub fn execute(ctx: &Context, _args: &Args) -> Result<()> {
    let session = ctx.session();
    if !session.is_logged_in() {
        eprintln!("Not logged in");
        return Ok(());
    }
    session.logout()?;
    eprintln!("Logged out");
    Ok(())
}
