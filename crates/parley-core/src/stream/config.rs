//! Stream session configuration.

use std::time::Duration;

/// Default silence allowed while opening the channel and between two fragments.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// What a session does when the channel closes before a terminal frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClosurePolicy {
    /// Fail with [`StreamError::Truncated`](crate::error::StreamError::Truncated).
    #[default]
    RequireTerminal,
    /// Treat the closure as a normal completion.
    ImplicitComplete,
}

/// Configuration for stream sessions.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum wait for the channel to open and between fragments; `None`
    /// waits forever.
    pub idle_timeout: Option<Duration>,
    pub closure_policy: ClosurePolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            closure_policy: ClosurePolicy::default(),
        }
    }
}

impl StreamConfig {
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_closure_policy(mut self, policy: ClosurePolicy) -> Self {
        self.closure_policy = policy;
        self
    }
}
