//! API base URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// Default API base URL used when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// A validated base URL of the support API.
///
/// Network URLs must use HTTPS (or HTTP for localhost). The base may carry a
/// path prefix such as `/api`; endpoint paths are appended to it.
///
/// # Example
///
/// ```
/// use parley_core::ApiUrl;
///
/// let api = ApiUrl::new("https://support.example.com/api/").unwrap();
/// assert_eq!(
///     api.endpoint("/v1/auth/refresh"),
///     "https://support.example.com/api/v1/auth/refresh"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApiUrl(Url);

impl ApiUrl {
    /// Create a new API URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid or doesn't meet requirements.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::ApiUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        Ok(Self(url))
    }

    /// Returns the full URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        // The URL crate always adds a trailing slash to root paths
        let base = self.0.as_str().trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    /// Returns true if the API runs on the local machine.
    pub fn is_localhost(&self) -> bool {
        self.0
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]" || h == "::1")
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        let scheme = url.scheme();
        let is_localhost = url.host_str().is_some_and(|h| {
            h == "localhost" || h == "127.0.0.1" || h == "[::1]" || h == "::1"
        });

        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must use HTTPS (HTTP allowed only for localhost)".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for ApiUrl {
    fn default() -> Self {
        Self(Url::parse(DEFAULT_API_URL).expect("default API URL is valid"))
    }
}

impl fmt::Display for ApiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApiUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ApiUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ApiUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ApiUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for ApiUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_https_url() {
        let api = ApiUrl::new("https://support.example.com").unwrap();
        assert_eq!(api.host(), Some("support.example.com"));
        assert!(!api.is_localhost());
    }

    #[test]
    fn valid_localhost_http() {
        let api = ApiUrl::new("http://localhost:8000/api").unwrap();
        assert!(api.is_localhost());
    }

    #[test]
    fn endpoint_keeps_path_prefix() {
        let api = ApiUrl::new("http://127.0.0.1:8000/api").unwrap();
        assert_eq!(
            api.endpoint("/v1/chat/chat/stream"),
            "http://127.0.0.1:8000/api/v1/chat/chat/stream"
        );
    }

    #[test]
    fn endpoint_handles_trailing_slash_on_root() {
        let api = ApiUrl::new("https://support.example.com/").unwrap();
        assert_eq!(
            api.endpoint("v1/auth/me"),
            "https://support.example.com/v1/auth/me"
        );
    }

    #[test]
    fn default_points_at_local_backend() {
        assert_eq!(
            ApiUrl::default().endpoint("/v1/auth/login"),
            "http://localhost:8000/api/v1/auth/login"
        );
    }

    #[test]
    fn invalid_http_non_localhost() {
        assert!(ApiUrl::new("http://support.example.com").is_err());
    }

    #[test]
    fn invalid_relative_url() {
        assert!(ApiUrl::new("/v1/auth/me").is_err());
    }

    #[test]
    fn serde_round_trip_validates() {
        let api: ApiUrl = serde_json::from_str("\"https://support.example.com/api\"").unwrap();
        assert_eq!(api.as_str(), "https://support.example.com/api");
        assert!(serde_json::from_str::<ApiUrl>("\"ftp://x\"").is_err());
    }
}
