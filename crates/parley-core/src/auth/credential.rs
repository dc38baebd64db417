//! Credential and authentication state types.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{AccessToken, RefreshToken};

/// The token pair representing one authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: AccessToken,
    refresh_token: Option<RefreshToken>,
    issued_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Create a credential without a known expiry.
    pub fn new(access_token: AccessToken, refresh_token: Option<RefreshToken>) -> Self {
        Self {
            access_token,
            refresh_token,
            issued_at: None,
            expires_at: None,
        }
    }

    /// Set an absolute expiry.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Record when the access token was issued.
    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    /// Set the expiry from an `expires_in` value in seconds, counted from now.
    pub fn expiring_in(mut self, seconds: i64) -> Self {
        let now = Utc::now();
        self.issued_at = Some(now);
        self.expires_at = TimeDelta::try_seconds(seconds).map(|delta| now + delta);
        self
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the access token is known to be expired at `now`.
    ///
    /// A credential without an expiry is never considered expired locally;
    /// the server's rejection is the only signal in that case.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Returns true if the access token should be refreshed before use at
    /// `now`, `lead` ahead of its expiry.
    ///
    /// When the issue time is known the lead is capped at half the token's
    /// lifetime, so short-lived tokens are still used before being replaced.
    pub fn refresh_due_at(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };

        let mut lead = TimeDelta::from_std(lead).unwrap_or(TimeDelta::MAX);
        if let Some(issued_at) = self.issued_at {
            let half_life = (expires_at - issued_at) / 2;
            lead = lead.min(half_life.max(TimeDelta::zero()));
        }

        match now.checked_add_signed(lead) {
            Some(horizon) => self.is_expired_at(horizon),
            None => true,
        }
    }
}

/// Observable authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No credential; the user has to log in.
    Anonymous,
    /// A credential is stored.
    Authenticated,
    /// A refresh exchange is in flight.
    Refreshing,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Anonymous => "anonymous",
            AuthState::Authenticated => "authenticated",
            AuthState::Refreshing => "refreshing",
        }
    }
}
