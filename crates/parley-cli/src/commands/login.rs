//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use parley_core::Credentials;
use parley_http::ChatClient;

use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long, env = "PARLEY_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(client: &ChatClient, args: LoginArgs) -> Result<()> {
    let credentials = Credentials::new(&args.email, &args.password);

    eprintln!("{}", "Logging in...".dimmed());

    let credential = client
        .login(&credentials)
        .await
        .context("Failed to login")?;

    output::success("Logged in successfully");
    println!();
    output::field("User", &args.email);
    output::field("API", client.api_url().as_str());
    if let Some(expires_at) = credential.expires_at() {
        output::field("Expires", &expires_at.to_rfc3339());
    }

    Ok(())
}
