//! Sync state machine vocabulary.
//!
//! ```text
//! Uninitialized -> AwaitingIdentity -> LoadingAnonymous ----------------------> Synced
//!                                   -> LoadingAuthenticated -> [MergingOnLogin] -> Synced
//! ```
//!
//! Any identity change from a state other than `Uninitialized` runs the
//! exit actions of [`Transition`] and goes back to `AwaitingIdentity`.

use std::fmt;

use suburbia_core::{Identity, UserId};

use crate::events::WriteTarget;

/// Where the controller is in the load cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// Nothing has been observed yet.
    #[default]
    Uninitialized,
    /// Waiting for the identity provider to resolve, or about to load.
    AwaitingIdentity,
    LoadingAnonymous,
    LoadingAuthenticated(UserId),
    /// Folding the device cart into the user's remote cart.
    MergingOnLogin(UserId),
    /// The initial load for the tracked identity has completed.
    Synced,
}

impl SyncPhase {
    /// Whether a load for the tracked identity is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(
            self,
            Self::LoadingAnonymous | Self::LoadingAuthenticated(_) | Self::MergingOnLogin(_)
        )
    }
}

/// Per-epoch sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncState {
    /// The identity whose cart is (being) loaded. `None` before the first
    /// resolution.
    pub tracked_identity: Option<Identity>,
    /// Set once per epoch, after the initial load (and any merge) finished.
    pub has_completed_initial_load: bool,
    /// The remote cart could not be fetched this epoch. Writes stay on the
    /// device so the account cart is neither read nor overwritten.
    pub degraded: bool,
    /// Bumped on every new epoch; a load only applies to the epoch it began in.
    pub epoch: u64,
}

impl SyncState {
    /// Start a new epoch for `identity`.
    pub fn begin_epoch(&mut self, identity: Identity) {
        self.tracked_identity = Some(identity);
        self.has_completed_initial_load = false;
        self.degraded = false;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// The store that is authoritative for `identity` in this epoch.
    #[must_use]
    pub fn write_target(&self, identity: &Identity) -> WriteTarget {
        match identity {
            Identity::User(user) if !self.degraded => WriteTarget::Remote(user.clone()),
            _ => WriteTarget::Local,
        }
    }

    /// Whether write-back may proceed for the identity observed right now.
    ///
    /// Both halves must hold: the epoch finished loading, and the observed
    /// identity is the one the epoch belongs to.
    #[must_use]
    pub fn permits_write(&self, observed: Option<&Identity>) -> bool {
        self.has_completed_initial_load
            && observed.is_some()
            && self.tracked_identity.as_ref() == observed
    }
}

/// Classification of an identity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First resolved identity of the process.
    FirstResolution,
    /// Anonymous to a user: keep the device cart, it is merged after load.
    Login,
    /// User to anonymous: the device cart must not leak into the next
    /// anonymous session.
    Logout,
    /// One user to another: the device cart has no reliable owner.
    SwitchUser,
    /// Same identity as before.
    Unchanged,
}

impl Transition {
    /// Classify a change from `previous` (if any) to `next`.
    #[must_use]
    pub fn classify(previous: Option<&Identity>, next: &Identity) -> Self {
        match (previous, next) {
            (None, _) => Self::FirstResolution,
            (Some(prev), next) if prev == next => Self::Unchanged,
            (Some(Identity::Anonymous), Identity::User(_)) => Self::Login,
            (Some(Identity::User(_)), Identity::Anonymous) => Self::Logout,
            (Some(Identity::User(_)), Identity::User(_)) => Self::SwitchUser,
            // Anonymous -> Anonymous is caught by the equality arm
            (Some(Identity::Anonymous), Identity::Anonymous) => Self::Unchanged,
        }
    }

    /// Whether the device cart is cleared before the next load.
    #[must_use]
    pub const fn clears_local(self) -> bool {
        matches!(self, Self::Logout | Self::SwitchUser)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FirstResolution => "first_resolution",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::SwitchUser => "switch_user",
            Self::Unchanged => "unchanged",
        })
    }
}
