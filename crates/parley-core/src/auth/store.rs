//! In-memory session store.

use std::sync::{PoisonError, RwLock};

use crate::traits::SessionStore;

use super::Credential;

/// Session store that keeps the credential in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    credential: RwLock<Option<Credential>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that starts signed in.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Credential) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    fn clear(&self) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccessToken;

    #[test]
    fn set_get_clear() {
        let store = MemorySessionStore::new();
        assert!(store.get().is_none());

        store.set(Credential::new(AccessToken::new("a1"), None));
        assert_eq!(store.get().unwrap().access_token().as_str(), "a1");

        store.clear();
        assert!(store.get().is_none());
    }
}
