//! Validated value types.

mod api_url;
mod chat;

pub use api_url::{ApiUrl, DEFAULT_API_URL};
pub use chat::{ChatReply, ChatRequest, UserProfile};
