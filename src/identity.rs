//! Identity context consumed by the session.
//!
//! Authentication itself lives outside this crate; the session only needs the
//! current user id and a stream of changes to it.

use tokio::sync::watch;

use crate::types::Uid;

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: Uid,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<Uid>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
        }
    }
}

/// Source of the signed-in identity.
pub trait IdentityProvider: Send + Sync {
    /// A receiver that always holds the current identity (`None` when signed
    /// out) and wakes on every change.
    fn observe_identity(&self) -> watch::Receiver<Option<Identity>>;

    fn current_user_id(&self) -> Option<Uid> {
        self.observe_identity()
            .borrow()
            .as_ref()
            .map(|identity| identity.uid.clone())
    }
}

/// Provider driven directly by the caller. Used by the sandbox binary and tests.
#[derive(Debug)]
pub struct LocalIdentity {
    tx: watch::Sender<Option<Identity>>,
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentity {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn signed_in(identity: Identity) -> Self {
        let (tx, _rx) = watch::channel(Some(identity));
        Self { tx }
    }

    pub fn sign_in(&self, identity: Identity) {
        self.tx.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }
}

impl IdentityProvider for LocalIdentity {
    fn observe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}
