//! Chat command implementation.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::warn;

use parley_core::{Callbacks, ChatRequest, Error, Frame, SessionState};
use parley_http::ChatClient;

use crate::output;

use super::{require_session, session_error};

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Bot to talk to
    #[arg(long)]
    pub bot: String,

    /// Continue an existing conversation
    #[arg(long)]
    pub conversation: Option<String>,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// Output stream records (or the reply) as JSON
    #[arg(long)]
    pub json: bool,

    /// Message text
    #[arg(required = true, trailing_var_arg = true)]
    pub message: Vec<String>,
}

pub async fn run(client: &ChatClient, args: ChatArgs) -> Result<()> {
    require_session(client)?;

    let mut request = ChatRequest::new(&args.bot, args.message.join(" "));
    if let Some(conversation) = &args.conversation {
        request = request.in_conversation(conversation);
    }

    if args.no_stream {
        let reply = client.chat(&request).await.map_err(session_error)?;
        if args.json {
            return output::json(&reply);
        }
        println!("{}", reply.content);
        eprintln!("{} {}", "conversation:".dimmed(), reply.conversation_id.dimmed());
        return Ok(());
    }

    stream(client, &request, args.json).await
}

/// What the stream callbacks leave behind for the command.
#[derive(Default)]
struct Outcome {
    conversation_id: Option<String>,
    error: Option<Error>,
}

async fn stream(client: &ChatClient, request: &ChatRequest, json: bool) -> Result<()> {
    let outcome = Arc::new(Mutex::new(Outcome::default()));

    let callbacks = {
        let on_frame_outcome = Arc::clone(&outcome);
        let on_error_outcome = Arc::clone(&outcome);
        Callbacks::new(
            move |frame: &Frame| {
                if let Some(id) = frame.conversation_id() {
                    on_frame_outcome
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .conversation_id = Some(id.to_string());
                }
                let printed = match (json, frame.payload(), frame.content()) {
                    (true, Some(chunk), _) => output::json(chunk),
                    (false, _, Some(text)) => output::fragment(text),
                    _ => Ok(()),
                };
                if let Err(e) = printed {
                    warn!(error = %e, "Failed to print frame");
                }
            },
            move |err: Error| {
                on_error_outcome
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .error = Some(err);
            },
            move || {
                if !json {
                    println!();
                }
            },
        )
    };

    let handle = client.stream(request, callbacks);
    let cancel = handle.cancel_handle();
    let finished = handle.wait();
    tokio::pin!(finished);

    let state = tokio::select! {
        state = &mut finished => state,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            finished.await
        }
    };

    let mut outcome = outcome.lock().unwrap_or_else(PoisonError::into_inner);
    match state {
        SessionState::Cancelled => {
            println!();
            output::warning("Cancelled");
            Ok(())
        }
        SessionState::Failed => {
            if !json {
                println!();
            }
            match outcome.error.take() {
                Some(err) => Err(session_error(err)).context("Chat stream failed"),
                None => anyhow::bail!("Chat stream failed"),
            }
        }
        _ => {
            if let (false, Some(id)) = (json, &outcome.conversation_id) {
                eprintln!("{} {}", "conversation:".dimmed(), id.dimmed());
            }
            Ok(())
        }
    }
}
