//! Login command - authorize access to a Dropbox account.
//!
//! # Examples
//!
//! ```bash
//! # Interactive PKCE flow (prints a URL, then asks for the code)
//! dropdocs login --app-key abc123xyz
//!
//! # Store a token generated in the app console
//! dropdocs login --token sl.B0abc...
//!
//! # Store a serialized credential from another machine
//! dropdocs login --credential "$(cat credential.json)"
//! ```

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context as _, Result, bail};
use clap::Args as ClapArgs;
use dropdocs_remote::{Credential, PkceFlow};
use tracing::instrument;

use super::Context;

#[derive(ClapArgs)]
pub struct Args {
    /// App key for the PKCE authorization flow (defaults to `app_key` in config)
    #[arg(long, env = "DROPDOCS_APP_KEY")]
    pub app_key: Option<String>,

    /// Authorization code, skipping the interactive prompt
    #[arg(long)]
    pub code: Option<String>,

    /// Store a bare access token
    #[arg(long, conflicts_with = "credential")]
    pub token: Option<String>,

    /// Store a serialized credential (JSON) as-is
    #[arg(long)]
    pub credential: Option<String>,
}

#[instrument(level = "info", name = "cmd::login", skip_all)]
pub fn execute(ctx: &Context, args: &Args) -> Result<()> {
    let serialized = if let Some(token) = &args.token {
        Credential::parse(token)?.serialize()?
    } else if let Some(credential) = &args.credential {
        // Validate before storing; the stored form is what the user passed.
        Credential::parse(credential)?;
        credential.trim().to_string()
    } else {
        let app_key = args
            .app_key
            .clone()
            .or_else(|| ctx.config.app_key.clone())
            .context("No app key: pass --app-key, set DROPDOCS_APP_KEY, or add app_key to the config file")?;
        authorize(ctx, &app_key, args.code.as_deref())?
    };

    ctx.session().login(&serialized)?;
    eprintln!("Logged in. Credential stored at {}", ctx.store.path().display());
    Ok(())
}

/// Run the PKCE authorization-code flow and return the serialized credential.
fn authorize(ctx: &Context, app_key: &str, code: Option<&str>) -> Result<String> {
    let gateway = ctx.gateway()?;
    let flow = PkceFlow::new();
    let url = gateway.authorize_url(app_key, &flow)?;

    let code = if let Some(code) = code {
        code.trim().to_string()
    } else {
        eprintln!("1. Open this URL and allow access:\n\n   {url}\n");
        eprintln!("2. Paste the authorization code here:");
        read_code()?
    };
    if code.is_empty() {
        bail!("Authorization code is empty");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let credential = runtime
        .block_on(gateway.exchange_code(app_key, &code, &flow))
        .context("Failed to exchange authorization code")?;
    Ok(credential.serialize()?)
}

fn read_code() -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("> ");
        io::stderr().flush()?;
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
