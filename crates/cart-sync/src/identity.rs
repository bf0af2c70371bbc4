//! Identity observer.
//!
//! Bridges the identity provider to the sync controller over a
//! `tokio::sync::watch` channel. The provider side publishes what it knows;
//! the controller side reads the current value at any time and awaits
//! changes.
//!
//! Only distinct resolved identities produce a notification. Publishing the
//! identity that is already current is a no-op, and once an identity has
//! been resolved the channel never goes back to "not yet resolved".

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use suburbia_core::Identity;

/// What the identity provider reports: `{ resolved, identity }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    /// `false` while the provider is still loading the session.
    pub resolved: bool,
    pub identity: Identity,
}

/// The observed identity, including the "not yet resolved" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    #[default]
    Unresolved,
    Resolved(Identity),
}

impl IdentityState {
    /// The resolved identity, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Unresolved => None,
            Self::Resolved(identity) => Some(identity),
        }
    }
}

/// Create a connected publisher/observer pair, starting unresolved.
#[must_use]
pub fn identity_channel() -> (IdentityPublisher, IdentityObserver) {
    let (tx, rx) = watch::channel(IdentityState::Unresolved);
    (IdentityPublisher { tx }, IdentityObserver { rx })
}

/// Provider-side handle.
#[derive(Debug)]
pub struct IdentityPublisher {
    tx: watch::Sender<IdentityState>,
}

impl IdentityPublisher {
    /// Publish a provider snapshot. Unresolved snapshots are ignored.
    ///
    /// Returns `true` if observers were notified.
    pub fn publish(&self, snapshot: ProviderSnapshot) -> bool {
        if !snapshot.resolved {
            return false;
        }
        self.publish_identity(snapshot.identity)
    }

    /// Publish a resolved identity.
    ///
    /// Returns `true` if it differs from the current one and observers were
    /// notified.
    pub fn publish_identity(&self, identity: Identity) -> bool {
        let notified = self.tx.send_if_modified(|state| {
            if state.identity() == Some(&identity) {
                return false;
            }
            *state = IdentityState::Resolved(identity);
            true
        });
        if notified {
            tracing::debug!(identity = ?self.tx.borrow().identity(), "identity changed");
        }
        notified
    }

    /// Create another observer of this channel.
    #[must_use]
    pub fn subscribe(&self) -> IdentityObserver {
        IdentityObserver {
            rx: self.tx.subscribe(),
        }
    }
}

/// Controller-side handle.
#[derive(Debug, Clone)]
pub struct IdentityObserver {
    rx: watch::Receiver<IdentityState>,
}

impl IdentityObserver {
    /// The identity as of right now.
    #[must_use]
    pub fn current(&self) -> IdentityState {
        self.rx.borrow().clone()
    }

    /// Wait for the next resolved identity that this observer has not seen.
    ///
    /// Returns `None` once the publisher has been dropped.
    pub async fn changed(&mut self) -> Option<Identity> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let resolved = self.rx.borrow_and_update().identity().cloned();
            if resolved.is_some() {
                return resolved;
            }
        }
    }

    /// Whether a notification is waiting to be consumed by [`Self::changed`].
    #[must_use]
    pub fn has_pending_change(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
