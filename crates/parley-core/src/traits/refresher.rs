//! Credential refresh capability.

use async_trait::async_trait;

use crate::auth::Credential;
use crate::{RefreshToken, Result};

/// Exchanges a refresh token for a new credential.
#[async_trait]
pub trait Refresher: Send + Sync {
    /// Perform the refresh exchange.
    ///
    /// Any error is treated as irrecoverable: the caller clears the stored
    /// credential and signs the user out.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<Credential>;
}
