//! REST endpoint paths and wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_core::{AccessToken, Credential, RefreshToken};

/// POST, form `username` + `password`.
pub const LOGIN: &str = "/v1/auth/login";

/// POST, JSON `{refresh_token}`.
pub const REFRESH: &str = "/v1/auth/refresh";

pub const LOGOUT: &str = "/v1/auth/logout";

pub const ME: &str = "/v1/auth/me";

pub const CHAT: &str = "/v1/chat/chat";

pub const CHAT_STREAM: &str = "/v1/chat/chat/stream";

/// Form body for login. The API names the email field `username`.
#[derive(Debug, Serialize)]
pub struct LoginForm<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Token pair issued by login and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Build the stored credential, keeping `previous` if no new refresh
    /// token was issued.
    pub fn into_credential(self, previous: Option<&RefreshToken>) -> Credential {
        let refresh = self
            .refresh_token
            .map(RefreshToken::new)
            .or_else(|| previous.cloned());
        let credential = Credential::new(AccessToken::new(self.access_token), refresh);

        match self.expires_in {
            Some(seconds) => credential.expiring_in(seconds),
            None => credential,
        }
    }
}

/// Error body returned by the API.
///
/// `detail` is either a message or a list of validation errors.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Returns a human-readable message.
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Some(Value::String(detail)) => Some(detail.clone()),
            Some(Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            _ => self.message.clone(),
        }
    }
}
