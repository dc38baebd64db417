//! Refresh command implementation.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use parley_core::SessionStore;
use parley_http::ChatClient;

use crate::output;

use super::{require_session, session_error};

#[derive(Args, Debug)]
pub struct RefreshArgs {}

pub async fn run(client: &ChatClient, _args: RefreshArgs) -> Result<()> {
    require_session(client)?;

    eprintln!("{}", "Refreshing session...".dimmed());

    client.refresh().await.map_err(session_error)?;

    output::success("Session refreshed successfully");
    if let Some(expires_at) = client.auth().store().get().and_then(|c| c.expires_at()) {
        output::field("Expires", &expires_at.to_rfc3339());
    }

    Ok(())
}
