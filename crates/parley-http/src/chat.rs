//! High-level chat client.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use parley_core::{
    AccessToken, ApiUrl, AuthContinuity, AuthState, ChatReply, ChatRequest, Credential,
    Credentials, FrameHandler, FrameStream, MemorySessionStore, Result, SessionStore,
    StreamHandle, StreamReply, StreamSession, UserProfile,
};

use crate::config::ClientConfig;
use crate::transport::HttpTransport;

/// Client for the support API.
///
/// Every authenticated call goes through the same [`AuthContinuity`], so an
/// expired token is refreshed once and shared by all concurrent requests,
/// streaming or not.
///
/// # Example
///
/// ```no_run
/// use parley_core::{ChatRequest, Credentials};
/// use parley_http::{ChatClient, ClientConfig};
///
/// # async fn example() -> parley_core::Result<()> {
/// let client = ChatClient::in_memory(ClientConfig::default())?;
/// client.login(&Credentials::new("agent@example.com", "secret")).await?;
///
/// let reply = client
///     .collect(&ChatRequest::new("support-bot", "Hello"))
///     .await?;
/// println!("{}", reply.content);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<HttpTransport>,
    auth: AuthContinuity,
    streams: StreamSession,
    api: ApiUrl,
}

impl ChatClient {
    /// Create a client backed by `store`.
    pub fn new(config: ClientConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        let auth = AuthContinuity::with_config(store, transport.clone(), config.auth.clone());
        let streams = StreamSession::with_config(transport.clone(), auth.clone(), config.stream);

        Ok(Self {
            transport,
            auth,
            streams,
            api: config.api_url,
        })
    }

    /// Create a client whose session lives only as long as the process.
    pub fn in_memory(config: ClientConfig) -> Result<Self> {
        Self::new(config, Arc::new(MemorySessionStore::new()))
    }

    pub fn api_url(&self) -> &ApiUrl {
        &self.api
    }

    pub fn auth(&self) -> &AuthContinuity {
        &self.auth
    }

    pub fn state(&self) -> AuthState {
        self.auth.state()
    }

    /// Log in and store the issued credential.
    #[instrument(skip(self, credentials), fields(api = %self.api))]
    pub async fn login(&self, credentials: &Credentials) -> Result<Credential> {
        let credential = self.transport.login(credentials).await?;
        self.auth.sign_in(credential.clone());
        info!("Logged in");
        Ok(credential)
    }

    /// Log out locally. The server is told on a best-effort basis.
    #[instrument(skip(self), fields(api = %self.api))]
    pub async fn logout(&self) {
        if let Some(credential) = self.auth.store().get() {
            if let Err(err) = self.transport.logout(credential.access_token()).await {
                warn!(error = %err, "Server-side logout failed");
            }
        }
        self.auth.sign_out();
        info!("Logged out");
    }

    /// Returns the logged-in user.
    pub async fn me(&self) -> Result<UserProfile> {
        let transport = &self.transport;
        self.auth
            .execute(move |token| async move { transport.me(&token).await })
            .await
    }

    /// Send a message and wait for the complete reply.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        request.validate()?;
        let request = ChatRequest {
            stream: false,
            ..request.clone()
        };

        let transport = &self.transport;
        let request = &request;
        self.auth
            .execute(move |token| async move { transport.chat(request, &token).await })
            .await
    }

    /// Stream the reply to `request` as frames.
    pub fn frames(&self, request: &ChatRequest) -> FrameStream {
        self.streams.frames(request)
    }

    /// Stream the reply on a background task, dispatching to `handler`.
    pub fn stream<H: FrameHandler>(&self, request: &ChatRequest, handler: H) -> StreamHandle {
        self.streams.start(request, handler)
    }

    /// Stream the reply and return it once complete.
    pub async fn collect(&self, request: &ChatRequest) -> Result<StreamReply> {
        self.streams.collect(request).await
    }

    /// Refresh the session now.
    pub async fn refresh(&self) -> Result<AccessToken> {
        self.auth.refresh_now().await
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("api", &self.api)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}
