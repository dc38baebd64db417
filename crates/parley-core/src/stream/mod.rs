//! Streaming chat exchanges.
//!
//! A [`StreamSession`] opens the response channel for a chat request through
//! the [`Transport`](crate::traits::Transport), feeds every fragment to a
//! [`FrameDecoder`](crate::frame::FrameDecoder) and hands the resulting frames
//! to the consumer, either as a pull-based [`FrameStream`] or by driving a
//! [`FrameHandler`] on a background task.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use parley_core::stream::StreamSession;
//! use parley_core::types::ChatRequest;
//!
//! # async fn example(session: StreamSession) -> parley_core::Result<()> {
//! let request = ChatRequest::new("support-bot", "Where is my invoice?");
//! let mut frames = session.frames(&request);
//!
//! while let Some(frame) = frames.next().await {
//!     if let Some(text) = frame?.content() {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod handler;
mod reply;
mod session;

pub use config::{ClosurePolicy, DEFAULT_IDLE_TIMEOUT, StreamConfig};
pub use handler::{Callbacks, FrameHandler};
pub use reply::StreamReply;
pub use session::{CancelHandle, FrameStream, SessionState, StreamHandle, StreamSession};
