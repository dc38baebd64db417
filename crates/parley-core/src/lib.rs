//! parley-core - Incremental chat streaming and session continuity.
//!
//! The crate is transport-agnostic: it decodes the assistant service's
//! line-oriented stream format into [`Frame`]s, drives streaming exchanges
//! through a [`StreamSession`], and keeps an authenticated session alive
//! across token expiry with [`AuthContinuity`]. Network access is supplied
//! through the [`Transport`] and [`Refresher`] traits.

pub mod auth;
pub mod credentials;
pub mod error;
pub mod frame;
pub mod stream;
pub mod tokens;
pub mod traits;
pub mod types;

pub use auth::{AuthConfig, AuthContinuity, AuthState, Credential, MemorySessionStore};
pub use credentials::Credentials;
pub use error::Error;
pub use frame::{Frame, FrameDecoder, FrameKind, StreamChunk};
pub use stream::{
    Callbacks, CancelHandle, ClosurePolicy, FrameHandler, FrameStream, SessionState,
    StreamConfig, StreamHandle, StreamReply, StreamSession,
};
pub use tokens::{AccessToken, RefreshToken};
pub use traits::{FragmentStream, Refresher, SessionStore, Transport};
pub use types::{ApiUrl, ChatReply, ChatRequest, UserProfile};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
