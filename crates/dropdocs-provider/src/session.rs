//! Login state and roots-changed notification.
//!
//! The host caches the root list, so every login and logout has to tell it
//! to query roots again. [`Session`] ties the credential store to that
//! notification.

use std::sync::Arc;

use tracing::info;

use crate::error::ProviderError;
use crate::store::CredentialStore;

/// Receives "the set of roots changed" signals.
pub trait RootsNotifier: Send + Sync {
    /// Tell the host to re-query roots.
    fn roots_changed(&self);
}

impl<F> RootsNotifier for F
where
    F: Fn() + Send + Sync,
{
    fn roots_changed(&self) {
        self()
    }
}

/// Notifier that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl RootsNotifier for NoopNotifier {
    fn roots_changed(&self) {}
}

/// Login/logout over a credential store.
pub struct Session<S: CredentialStore, N: RootsNotifier> {
    store: Arc<S>,
    notifier: N,
}

impl<S: CredentialStore, N: RootsNotifier> Session<S, N> {
    /// Create a session over `store`.
    pub fn new(store: Arc<S>, notifier: N) -> Self {
        Self { store, notifier }
    }

    /// Whether a credential is stored.
    pub fn is_logged_in(&self) -> bool {
        self.store.has_credential()
    }

    /// Store a serialized credential and notify the host.
    pub fn login(&self, credential: &str) -> Result<(), ProviderError> {
        if credential.is_empty() {
            return Err(ProviderError::InvalidArgument("empty credential".to_string()));
        }
        self.store.set_credential(credential)?;
        info!("logged in");
        self.notifier.roots_changed();
        Ok(())
    }

    /// Clear the credential and notify the host.
    pub fn logout(&self) -> Result<(), ProviderError> {
        self.store.set_credential("")?;
        info!("logged out");
        self.notifier.roots_changed();
        Ok(())
    }

    /// Credential store in use.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_login_logout_notifies() {
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let session = Session::new(Arc::new(MemoryCredentialStore::new()), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!session.is_logged_in());
        session.login("token").unwrap();
        assert!(session.is_logged_in());
        session.logout().unwrap();
        assert!(!session.is_logged_in());
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_login_is_rejected() {
        let session = Session::new(Arc::new(MemoryCredentialStore::new()), NoopNotifier);
        assert!(matches!(
            session.login(""),
            Err(ProviderError::InvalidArgument(_))
        ));
        assert!(!session.is_logged_in());
    }
}
