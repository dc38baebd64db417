//! Logout command implementation.

use anyhow::Result;
use clap::Args;

use parley_core::AuthState;
use parley_http::ChatClient;

use crate::output;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(client: &ChatClient, _args: LogoutArgs) -> Result<()> {
    if client.state() == AuthState::Anonymous {
        output::warning("Not logged in");
        return Ok(());
    }

    client.logout().await;
    output::success("Logged out");

    Ok(())
}
