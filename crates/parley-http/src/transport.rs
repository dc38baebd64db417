//! `reqwest` implementation of the core transport traits.

use async_trait::async_trait;
use tracing::{debug, instrument};

use parley_core::error::AuthError;
use parley_core::{
    AccessToken, Credential, Credentials, Error, FragmentStream, RefreshToken, Refresher, Result,
    Transport,
};
use parley_core::types::{ChatReply, ChatRequest, UserProfile};

use crate::client::HttpClient;
use crate::config::ClientConfig;
use crate::endpoints::{
    CHAT, CHAT_STREAM, LOGIN, LOGOUT, LoginForm, ME, REFRESH, RefreshRequest, TokenResponse,
};

/// Network access to the support API.
///
/// Implements [`Transport`] for streaming chat and [`Refresher`] for the
/// token exchange, plus the plain request/response endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }

    /// Exchange email and password for a credential.
    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    pub async fn login(&self, credentials: &Credentials) -> Result<Credential> {
        let form = LoginForm {
            username: credentials.email(),
            password: credentials.password(),
        };

        let response: TokenResponse = self
            .client
            .post_form(LOGIN, &form)
            .await
            .map_err(|err| match err {
                Error::Protocol(ref e) if e.status == 400 || e.status == 401 => {
                    debug!(error = %e, "Login rejected");
                    AuthError::InvalidCredentials.into()
                }
                other => other,
            })?;

        Ok(response.into_credential(None))
    }

    /// Revoke the session server-side.
    pub async fn logout(&self, token: &AccessToken) -> Result<()> {
        self.client.post_empty_authed(LOGOUT, token).await
    }

    pub async fn me(&self, token: &AccessToken) -> Result<UserProfile> {
        self.client.get(ME, token).await
    }

    pub async fn chat(&self, request: &ChatRequest, token: &AccessToken) -> Result<ChatReply> {
        self.client.post_json_authed(CHAT, request, token).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &ChatRequest, token: &AccessToken) -> Result<FragmentStream> {
        self.client.post_stream(CHAT_STREAM, request, token).await
    }
}

#[async_trait]
impl Refresher for HttpTransport {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<Credential> {
        let body = RefreshRequest {
            refresh_token: refresh_token.as_str(),
        };

        let response: TokenResponse = self.client.post_json(REFRESH, &body).await?;
        debug!("Token exchange succeeded");

        Ok(response.into_credential(Some(refresh_token)))
    }
}
