//! Credential lifecycle and transparent session continuity.
//!
//! A [`Credential`] lives in an injected [`SessionStore`](crate::traits::SessionStore)
//! rather than in a global. [`AuthContinuity`] is the only writer: it wraps
//! every outbound request, detects token expiry, runs a single shared
//! refresh for all requests that fail at the same time, and replays each
//! request once.

mod continuity;
mod credential;
mod store;

pub use continuity::{AuthConfig, AuthContinuity};
pub use credential::{AuthState, Credential};
pub use store::MemorySessionStore;
