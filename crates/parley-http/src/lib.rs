//! parley-http - HTTP transport and chat client.
//!
//! [`ChatClient`] is the entry point: it logs in, keeps the session alive
//! through [`parley_core::AuthContinuity`] and streams replies through
//! [`parley_core::StreamSession`], all over a shared `reqwest` client.

mod chat;
mod client;
mod config;
mod endpoints;
mod transport;

pub use chat::ChatClient;
pub use config::{ClientConfig, DEFAULT_TIMEOUT};
pub use endpoints::TokenResponse;
pub use transport::HttpTransport;
