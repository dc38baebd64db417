//! Credential storage capability.

use crate::auth::Credential;

/// Holder of the single credential shared by every request.
///
/// Streaming and ordinary requests read from the same store; only the auth
/// continuity manager writes to it. Implementations must be cheap to call
/// and must not block on the network.
pub trait SessionStore: Send + Sync {
    /// Returns the current credential, if the user is signed in.
    fn get(&self) -> Option<Credential>;

    /// Replace the current credential.
    fn set(&self, credential: Credential);

    /// Forget the current credential.
    fn clear(&self);
}
