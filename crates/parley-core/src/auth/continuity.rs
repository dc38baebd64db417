//! Single-flight refresh and replay-once request wrapper.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Error};
use crate::traits::{Refresher, SessionStore};
use crate::{AccessToken, Result};

use super::{AuthState, Credential};

type RefreshOperation = Shared<BoxFuture<'static, std::result::Result<AccessToken, AuthError>>>;

/// Tuning for the auth continuity manager.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Refresh ahead of the stored expiry by this margin, capped at half the
    /// token's lifetime.
    pub refresh_skew: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_skew: Duration::from_secs(30),
        }
    }
}

/// Wraps outbound requests so credential expiry is invisible to callers.
///
/// When a request fails because its access token was rejected:
///
/// 1. if a refresh is already in flight, the request awaits it;
/// 2. otherwise, if the store already holds a newer token, the request is
///    replayed with it;
/// 3. otherwise a refresh starts, and every request failing meanwhile joins it.
///
/// A successful refresh replays each waiting request exactly once. A failed
/// refresh clears the store, publishes [`AuthState::Anonymous`] and fails
/// every waiting request with [`AuthError::RefreshFailed`].
///
/// Cheap to clone; clones share the store and the in-flight refresh.
#[derive(Clone)]
pub struct AuthContinuity {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    refresher: Arc<dyn Refresher>,
    config: AuthConfig,
    inflight: Mutex<Option<RefreshOperation>>,
    state: watch::Sender<AuthState>,
    refreshes: AtomicU64,
}

impl AuthContinuity {
    pub fn new(store: Arc<dyn SessionStore>, refresher: Arc<dyn Refresher>) -> Self {
        Self::with_config(store, refresher, AuthConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn SessionStore>,
        refresher: Arc<dyn Refresher>,
        config: AuthConfig,
    ) -> Self {
        let initial = if store.get().is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        };
        let (state, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                store,
                refresher,
                config,
                inflight: Mutex::new(None),
                state,
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the session store shared by all requests.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    /// Returns the current authentication state.
    pub fn state(&self) -> AuthState {
        *self.inner.state.borrow()
    }

    /// Subscribe to authentication state changes.
    ///
    /// A transition to [`AuthState::Anonymous`] after a failed refresh is the
    /// signal to send the user back to the login screen.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Number of refresh exchanges started so far.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::Relaxed)
    }

    /// Store a freshly issued credential after login.
    pub fn sign_in(&self, credential: Credential) {
        self.inner.store.set(credential);
        self.inner.state.send_replace(AuthState::Authenticated);
        debug!("Signed in");
    }

    /// Forget the stored credential.
    pub fn sign_out(&self) {
        self.inner.store.clear();
        self.inner.state.send_replace(AuthState::Anonymous);
        debug!("Signed out");
    }

    /// Refresh now, joining a refresh that is already in flight.
    pub async fn refresh_now(&self) -> Result<AccessToken> {
        let credential = self.inner.store.get().ok_or(AuthError::NotAuthenticated)?;
        self.refresh_after(credential.access_token()).await
    }

    /// Run `request` with the current access token, refreshing and replaying
    /// it once if the token is rejected.
    ///
    /// `request` may be called twice and must be safe to replay.
    pub async fn execute<T, F, Fut>(&self, request: F) -> Result<T>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let credential = self.inner.store.get().ok_or(AuthError::NotAuthenticated)?;
        let mut token = credential.access_token().clone();

        if credential.refresh_due_at(Utc::now(), self.inner.config.refresh_skew) {
            debug!("Stored access token is about to expire, refreshing first");
            token = self.refresh_after(&token).await?;
        }

        match request(token.clone()).await {
            Err(err) if err.is_auth_expired() => {
                debug!(error = %err, "Access token rejected");
                let fresh = self.refresh_after(&token).await?;
                match request(fresh).await {
                    Err(err) if err.is_auth_expired() => {
                        warn!(error = %err, "Access token rejected again after refresh");
                        Err(AuthError::SessionExpired.into())
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Obtain a token newer than `stale`, refreshing at most once for all
    /// concurrent callers.
    async fn refresh_after(&self, stale: &AccessToken) -> Result<AccessToken> {
        let operation = {
            let mut slot = self
                .inner
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match slot.clone() {
                Some(operation) => {
                    debug!("Joining in-flight session refresh");
                    operation
                }
                None => {
                    let Some(current) = self.inner.store.get() else {
                        return Err(AuthError::NotAuthenticated.into());
                    };

                    if current.access_token() != stale {
                        debug!("Session was already refreshed, reusing the new token");
                        return Ok(current.access_token().clone());
                    }

                    let Some(refresh_token) = current.refresh_token().cloned() else {
                        drop(slot);
                        warn!("No refresh token available, signing out");
                        self.sign_out();
                        return Err(AuthError::RefreshFailed {
                            reason: "no refresh token".to_string(),
                        }
                        .into());
                    };

                    self.inner.refreshes.fetch_add(1, Ordering::Relaxed);
                    self.inner.state.send_replace(AuthState::Refreshing);

                    let inner = Arc::clone(&self.inner);
                    let operation = async move { inner.run_refresh(refresh_token).await }
                        .boxed()
                        .shared();
                    *slot = Some(operation.clone());
                    operation
                }
            }
        };

        let outcome = operation.clone().await;

        let mut slot = self
            .inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&operation)) {
            *slot = None;
        }
        drop(slot);

        outcome.map_err(Error::from)
    }
}

impl Inner {
    #[instrument(skip_all)]
    async fn run_refresh(
        &self,
        refresh_token: crate::RefreshToken,
    ) -> std::result::Result<AccessToken, AuthError> {
        info!("Refreshing session");

        match self.refresher.refresh(&refresh_token).await {
            Ok(credential) => {
                let token = credential.access_token().clone();
                self.store.set(credential);
                self.state.send_replace(AuthState::Authenticated);
                debug!("Session refreshed successfully");
                Ok(token)
            }
            Err(err) => {
                warn!(error = %err, "Session refresh failed, signing out");
                self.store.clear();
                self.state.send_replace(AuthState::Anonymous);
                Err(AuthError::RefreshFailed {
                    reason: err.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for AuthContinuity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContinuity")
            .field("state", &self.state())
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::RefreshToken;
    use crate::auth::MemorySessionStore;
    use crate::error::ProtocolError;

    /// Refresher that hands out `access-N` tokens, optionally waiting for a
    /// release signal first.
    struct CountingRefresher {
        calls: AtomicUsize,
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    impl CountingRefresher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                gate: None,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Refresher for CountingRefresher {
        async fn refresh(&self, refresh_token: &RefreshToken) -> Result<Credential> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(ProtocolError::new(401, None, Some("Invalid refresh token".into())).into());
            }
            assert_eq!(refresh_token.as_str(), "refresh-0");
            Ok(Credential::new(
                AccessToken::new(format!("access-{n}")),
                Some(RefreshToken::new("refresh-0")),
            ))
        }
    }

    fn signed_in_store() -> Arc<MemorySessionStore> {
        Arc::new(MemorySessionStore::with_credential(Credential::new(
            AccessToken::new("access-0"),
            Some(RefreshToken::new("refresh-0")),
        )))
    }

    fn expired() -> Error {
        ProtocolError::new(401, None, Some("Could not validate credentials".into())).into()
    }

    /// A request that only accepts the given token.
    async fn accepts(valid: &str, token: AccessToken) -> Result<String> {
        if token.as_str() == valid {
            Ok(format!("ok:{}", token.as_str()))
        } else {
            Err(expired())
        }
    }

    #[tokio::test]
    async fn passes_through_when_token_is_valid() {
        let refresher = Arc::new(CountingRefresher::new());
        let auth = AuthContinuity::new(signed_in_store(), refresher.clone());

        let out = auth.execute(|t| accepts("access-0", t)).await.unwrap();

        assert_eq!(out, "ok:access-0");
        assert_eq!(refresher.calls(), 0);
        assert_eq!(auth.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn anonymous_requests_are_not_issued() {
        let auth = AuthContinuity::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(CountingRefresher::new()),
        );
        let issued = AtomicUsize::new(0);
        let counter = &issued;

        let err = auth
            .execute(move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::NotAuthenticated)));
        assert_eq!(issued.load(Ordering::SeqCst), 0);
        assert_eq!(auth.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_request_replayed_once() {
        let refresher = Arc::new(CountingRefresher::new());
        let store = signed_in_store();
        let auth = AuthContinuity::new(store.clone(), refresher.clone());
        let attempts = AtomicUsize::new(0);

        let out = auth
            .execute(|t| {
                attempts.fetch_add(1, Ordering::SeqCst);
                accepts("access-1", t)
            })
            .await
            .unwrap();

        assert_eq!(out, "ok:access-1");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(refresher.calls(), 1);
        assert_eq!(store.get().unwrap().access_token().as_str(), "access-1");
        assert_eq!(auth.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn request_is_never_retried_twice() {
        let refresher = Arc::new(CountingRefresher::new());
        let auth = AuthContinuity::new(signed_in_store(), refresher.clone());
        let attempts = AtomicUsize::new(0);

        let err = auth
            .execute(|_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(expired()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::SessionExpired)));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let refresher = Arc::new(CountingRefresher::new());
        let auth = AuthContinuity::new(signed_in_store(), refresher.clone());
        let attempts = AtomicUsize::new(0);

        let err = auth
            .execute(|_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ProtocolError::new(500, None, None).into()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol(ref e) if e.status == 500));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_expiries_share_one_refresh() {
        let gate = Arc::new(Notify::new());
        let refresher = Arc::new(CountingRefresher::gated(gate.clone()));
        let auth = AuthContinuity::new(signed_in_store(), refresher.clone());
        let mut states = auth.subscribe();

        let first = auth.execute(|t| accepts("access-1", t));
        let second = auth.execute(|t| accepts("access-1", t));
        let release = async {
            // Both requests have failed and are parked on the same refresh.
            states
                .wait_for(|s| *s == AuthState::Refreshing)
                .await
                .unwrap();
            tokio::task::yield_now().await;
            gate.notify_one();
        };

        let (a, b, ()) = tokio::join!(first, second, release);

        assert_eq!(a.unwrap(), "ok:access-1");
        assert_eq!(b.unwrap(), "ok:access-1");
        assert_eq!(refresher.calls(), 1);
        assert_eq!(auth.refresh_count(), 1);
    }

    #[tokio::test]
    async fn late_failure_reuses_already_refreshed_token() {
        let refresher = Arc::new(CountingRefresher::new());
        let store = signed_in_store();
        let auth = AuthContinuity::new(store.clone(), refresher.clone());

        // First request refreshes the session.
        auth.execute(|t| accepts("access-1", t)).await.unwrap();

        // A request that was issued with the old token fails afterwards.
        let fresh = auth
            .refresh_after(&AccessToken::new("access-0"))
            .await
            .unwrap();

        assert_eq!(fresh.as_str(), "access-1");
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn refresh_failure_clears_store_and_signals_logout() {
        let gate = Arc::new(Notify::new());
        let refresher = Arc::new(CountingRefresher {
            gate: Some(gate.clone()),
            ..CountingRefresher::failing()
        });
        let store = signed_in_store();
        let auth = AuthContinuity::new(store.clone(), refresher.clone());
        let states = auth.subscribe();
        let mut transitions = auth.subscribe();

        let first = auth.execute(|t| accepts("never", t));
        let second = auth.execute(|t| accepts("never", t));
        let release = async {
            // Both requests have failed and are parked on the same refresh.
            transitions
                .wait_for(|s| *s == AuthState::Refreshing)
                .await
                .unwrap();
            tokio::task::yield_now().await;
            gate.notify_one();
        };

        let (a, b, ()) = tokio::join!(first, second, release);

        for result in [a, b] {
            let err = result.unwrap_err();
            assert!(
                matches!(err, Error::Auth(AuthError::RefreshFailed { .. })),
                "unexpected error: {err}"
            );
        }
        assert_eq!(refresher.calls(), 1);
        assert_eq!(auth.refresh_count(), 1);
        assert!(store.get().is_none());
        assert_eq!(*states.borrow(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn missing_refresh_token_signs_out() {
        let store = Arc::new(MemorySessionStore::with_credential(Credential::new(
            AccessToken::new("access-0"),
            None,
        )));
        let refresher = Arc::new(CountingRefresher::new());
        let auth = AuthContinuity::new(store.clone(), refresher.clone());

        let err = auth
            .execute(|t| accepts("access-1", t))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::RefreshFailed { .. })));
        assert_eq!(refresher.calls(), 0);
        assert!(store.get().is_none());
        assert_eq!(auth.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn locally_expired_credential_refreshes_before_first_attempt() {
        let store = Arc::new(MemorySessionStore::with_credential(
            Credential::new(
                AccessToken::new("access-0"),
                Some(RefreshToken::new("refresh-0")),
            )
            .with_expiry(Utc::now() - chrono::TimeDelta::minutes(1)),
        ));
        let refresher = Arc::new(CountingRefresher::new());
        let auth = AuthContinuity::new(store, refresher.clone());
        let attempts = AtomicUsize::new(0);

        let out = auth
            .execute(|t| {
                attempts.fetch_add(1, Ordering::SeqCst);
                accepts("access-1", t)
            })
            .await
            .unwrap();

        assert_eq!(out, "ok:access-1");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn short_lived_token_is_used_before_refreshing() {
        let store = Arc::new(MemorySessionStore::with_credential(
            Credential::new(
                AccessToken::new("access-0"),
                Some(RefreshToken::new("refresh-0")),
            )
            .expiring_in(20),
        ));
        let refresher = Arc::new(CountingRefresher::new());
        let auth = AuthContinuity::new(store, refresher.clone());

        for _ in 0..3 {
            let out = auth.execute(|t| accepts("access-0", t)).await.unwrap();
            assert_eq!(out, "ok:access-0");
        }
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn sign_in_and_out_publish_state() {
        let auth = AuthContinuity::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(CountingRefresher::new()),
        );
        assert_eq!(auth.state(), AuthState::Anonymous);

        auth.sign_in(Credential::new(AccessToken::new("a"), None));
        assert_eq!(auth.state(), AuthState::Authenticated);
        assert!(auth.store().get().is_some());

        auth.sign_out();
        assert_eq!(auth.state(), AuthState::Anonymous);
        assert!(auth.store().get().is_none());
    }
}
