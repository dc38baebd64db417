//! Streaming transport trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::types::ChatRequest;
use crate::{AccessToken, Result};

/// Raw fragments of a streaming response body, in arrival order.
///
/// Dropping the stream releases the underlying connection.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Opens the long-lived response channel for a chat request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the streaming request with the given bearer token.
    ///
    /// A rejected token must surface as an error for which
    /// [`Error::is_auth_expired`](crate::Error::is_auth_expired) returns true,
    /// so the request can be replayed after a refresh. Opening must be safe
    /// to repeat once.
    async fn open(&self, request: &ChatRequest, token: &AccessToken) -> Result<FragmentStream>;
}
