//! Client configuration.

use std::time::Duration;

use parley_core::{ApiUrl, AuthConfig, StreamConfig};

/// Default timeout for non-streaming requests and for connecting.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`ChatClient`](crate::ChatClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: ApiUrl,
    /// Applies to whole non-streaming requests and to the wait for a
    /// stream's response headers. Stream bodies are bounded by
    /// [`StreamConfig::idle_timeout`] instead.
    pub timeout: Duration,
    pub user_agent: String,
    pub stream: StreamConfig,
    pub auth: AuthConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(ApiUrl::default())
    }
}

impl ClientConfig {
    pub fn new(api_url: ApiUrl) -> Self {
        Self {
            api_url,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("parley/", env!("CARGO_PKG_VERSION")).to_string(),
            stream: StreamConfig::default(),
            auth: AuthConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_stream_config(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_auth_config(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }
}
