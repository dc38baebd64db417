//! Persisted login state.

mod storage;

pub use storage::{FileSessionStore, default_session_path};
