//! Whoami command implementation.

use anyhow::Result;
use clap::Args;

use parley_http::ChatClient;

use crate::output;

use super::{require_session, session_error};

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Output the profile as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(client: &ChatClient, args: WhoamiArgs) -> Result<()> {
    require_session(client)?;

    let profile = client.me().await.map_err(session_error)?;

    if args.json {
        return output::json_pretty(&profile);
    }

    output::field("ID", &profile.id);
    output::field("Email", &profile.email);
    if let Some(username) = &profile.username {
        output::field("Username", username);
    }
    output::field("Verified", if profile.is_verified { "yes" } else { "no" });
    output::field("API", client.api_url().as_str());

    Ok(())
}
