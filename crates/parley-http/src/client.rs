//! HTTP client for the support API.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, trace};

use parley_core::error::{InvalidInputError, ProtocolError, TransportError};
use parley_core::{AccessToken, ApiUrl, Error, FragmentStream, Result};

use crate::config::ClientConfig;
use crate::endpoints::ErrorResponse;

/// Thin wrapper over `reqwest` that knows the API's conventions.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: reqwest::Client,
    api: ApiUrl,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Http {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api: config.api_url.clone(),
            timeout: config.timeout,
        })
    }

    pub fn api(&self) -> &ApiUrl {
        &self.api
    }

    /// Authenticated GET.
    #[instrument(skip(self, token), fields(api = %self.api))]
    pub async fn get<R>(&self, path: &str, token: &AccessToken) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let url = self.api.endpoint(path);
        debug!(path, "GET");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, auth_header(token)?)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.handle_response(response).await
    }

    /// Unauthenticated POST with a JSON body.
    #[instrument(skip(self, body), fields(api = %self.api))]
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.api.endpoint(path);
        debug!(path, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.handle_response(response).await
    }

    /// Unauthenticated POST with a form body.
    #[instrument(skip(self, form), fields(api = %self.api))]
    pub async fn post_form<B, R>(&self, path: &str, form: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.api.endpoint(path);
        debug!(path, "POST form");

        let response = self
            .client
            .post(&url)
            .form(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.handle_response(response).await
    }

    /// Authenticated POST with a JSON body.
    #[instrument(skip(self, body, token), fields(api = %self.api))]
    pub async fn post_json_authed<B, R>(&self, path: &str, body: &B, token: &AccessToken) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.api.endpoint(path);
        debug!(path, "Authenticated POST");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header(token)?)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.handle_response(response).await
    }

    /// Authenticated POST without a body whose response is ignored.
    #[instrument(skip(self, token), fields(api = %self.api))]
    pub async fn post_empty_authed(&self, path: &str, token: &AccessToken) -> Result<()> {
        let url = self.api.endpoint(path);
        debug!(path, "Authenticated POST (no body)");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header(token)?)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Protocol(self.parse_error_response(response).await))
        }
    }

    /// Authenticated POST whose response body is an event stream.
    ///
    /// Only the wait for the response headers is bounded by the client
    /// timeout; the body may stay open for as long as the server keeps
    /// sending.
    #[instrument(skip(self, body, token), fields(api = %self.api))]
    pub async fn post_stream<B>(&self, path: &str, body: &B, token: &AccessToken) -> Result<FragmentStream>
    where
        B: Serialize,
    {
        let url = self.api.endpoint(path);
        debug!(path, "Opening event stream");

        let pending = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header(token)?)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(body)
            .send();

        let response = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| {
                Error::from(TransportError::Timeout {
                    duration_ms: millis(self.timeout),
                })
            })?
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        trace!(status = %status, "Stream response");
        if !status.is_success() {
            return Err(Error::Protocol(self.parse_error_response(response).await));
        }

        let fragments = response.bytes_stream().map(|chunk| {
            chunk.map(|bytes| bytes.to_vec()).map_err(|e| {
                Error::from(TransportError::Interrupted {
                    message: e.to_string(),
                })
            })
        });

        Ok(Box::pin(fragments))
    }

    /// Handle a response, parsing the body or error.
    async fn handle_response<R: DeserializeOwned>(&self, response: reqwest::Response) -> Result<R> {
        let status = response.status();
        trace!(status = %status, "Response");

        if status.is_success() {
            response.json::<R>().await.map_err(|e| self.transport_error(e))
        } else {
            Err(Error::Protocol(self.parse_error_response(response).await))
        }
    }

    /// Parse an error body into a protocol error.
    async fn parse_error_response(&self, response: reqwest::Response) -> ProtocolError {
        let status = response.status().as_u16();

        match response.json::<ErrorResponse>().await {
            Ok(body) => {
                let message = body.message();
                ProtocolError::new(status, body.error, message)
            }
            Err(_) => ProtocolError::new(status, None, None),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        let error = if err.is_timeout() {
            TransportError::Timeout {
                duration_ms: millis(self.timeout),
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        };
        Error::Transport(error)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn auth_header(token: &AccessToken) -> Result<HeaderValue> {
    HeaderValue::from_str(&token.bearer()).map_err(|_| {
        InvalidInputError::Other {
            message: "access token contains invalid header characters".to_string(),
        }
        .into()
    })
}
