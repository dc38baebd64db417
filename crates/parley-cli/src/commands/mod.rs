//! Subcommand implementations.

pub mod chat;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod whoami;

use std::sync::Arc;

use anyhow::{Context, Result, bail};

use parley_core::{ApiUrl, AuthState};
use parley_http::{ChatClient, ClientConfig};

use crate::cli::Commands;
use crate::session::{FileSessionStore, default_session_path};

pub async fn handle(command: Commands, api_url: &str) -> Result<()> {
    let client = connect(api_url)?;

    match command {
        Commands::Login(args) => login::run(&client, args).await,
        Commands::Logout(args) => logout::run(&client, args).await,
        Commands::Whoami(args) => whoami::run(&client, args).await,
        Commands::Refresh(args) => refresh::run(&client, args).await,
        Commands::Chat(args) => chat::run(&client, args).await,
    }
}

/// Build a client whose session is persisted in the user's data directory.
fn connect(api_url: &str) -> Result<ChatClient> {
    let api = ApiUrl::new(api_url).context("Invalid API URL")?;
    let path = default_session_path()?;
    let store = FileSessionStore::open(path, api.as_str()).context("Failed to load session")?;

    ChatClient::new(ClientConfig::new(api), Arc::new(store)).context("Failed to create client")
}

fn require_session(client: &ChatClient) -> Result<()> {
    if client.state() == AuthState::Anonymous {
        bail!("No active session. Run 'parley login' first.");
    }
    Ok(())
}

/// Attach a login hint to errors that end the session.
fn session_error(err: parley_core::Error) -> anyhow::Error {
    if err.requires_login() {
        anyhow::Error::new(err).context("Session is no longer valid. Run 'parley login' again.")
    } else {
        err.into()
    }
}
