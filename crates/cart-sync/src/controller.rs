//! The sync controller.
//!
//! Owns the in-memory cart and decides, for every identity change, which
//! store to read, whether to merge, and what to clear. Afterwards it writes
//! every cart mutation through to the store that is authoritative for the
//! current identity: the remote store for a signed-in user, the device store
//! for an anonymous shopper or for a user whose remote cart could not be
//! fetched.
//!
//! # Write gate
//!
//! A write (or explicit clear) only reaches a store when
//!
//! 1. the initial load for the tracked identity has completed, and
//! 2. the identity observed at write time is the tracked identity.
//!
//! Otherwise the write is dropped and [`SyncEvent::StaleWriteSuppressed`] is
//! emitted. The load for the new identity is authoritative.
//!
//! # Scheduling
//!
//! Every operation takes `&self`. The cart and the sync state sit behind a
//! mutex that is never held across a store call, so while a fetch or merge
//! write is outstanding the cart stays readable and mutations still apply to
//! memory (their write-back is gated until the load completes, and the load
//! result replaces them). Each identity epoch carries a counter; a load that
//! finishes after its epoch ended is discarded instead of being applied.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::instrument;

use suburbia_core::{CartSnapshot, Identity, UserId, merge};

use crate::error::LocalStoreError;
use crate::events::{EventHook, RemoteOp, SuppressReason, SyncEvent, WriteTarget};
use crate::identity::{IdentityObserver, IdentityState};
use crate::local::LocalCartStore;
use crate::remote::RemoteCartStore;
use crate::state::{SyncPhase, SyncState, Transition};

/// State shared between concurrent operations.
#[derive(Debug, Default)]
struct Inner {
    state: SyncState,
    phase: SyncPhase,
    cart: CartSnapshot,
}

/// Sequences identity transitions, loads, merges, and write-backs.
pub struct SyncController<L, R> {
    local: L,
    remote: R,
    identity: IdentityObserver,
    watcher: tokio::sync::Mutex<IdentityObserver>,
    inner: Mutex<Inner>,
    hook: Option<EventHook>,
}

impl<L, R> std::fmt::Debug for SyncController<L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SyncController")
            .field("state", &inner.state)
            .field("phase", &inner.phase)
            .field("items", &inner.cart.len())
            .finish_non_exhaustive()
    }
}

impl<L, R> SyncController<L, R>
where
    L: LocalCartStore,
    R: RemoteCartStore,
{
    /// Create a controller. Nothing is loaded until [`Self::sync`] runs.
    #[must_use]
    pub fn new(local: L, remote: R, identity: IdentityObserver) -> Self {
        Self {
            local,
            remote,
            watcher: tokio::sync::Mutex::new(identity.clone()),
            identity,
            inner: Mutex::new(Inner::default()),
            hook: None,
        }
    }

    /// Receive every [`SyncEvent`].
    #[must_use]
    pub fn with_event_hook(mut self, hook: EventHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// A copy of the in-memory cart.
    #[must_use]
    pub fn cart(&self) -> CartSnapshot {
        self.lock().cart.clone()
    }

    /// Read the in-memory cart without copying it.
    pub fn with_cart<T>(&self, f: impl FnOnce(&CartSnapshot) -> T) -> T {
        f(&self.lock().cart)
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.lock().phase.clone()
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.lock().state.clone()
    }

    #[must_use]
    pub const fn local_store(&self) -> &L {
        &self.local
    }

    #[must_use]
    pub const fn remote_store(&self) -> &R {
        &self.remote
    }

    #[must_use]
    pub const fn identity(&self) -> &IdentityObserver {
        &self.identity
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(hook) = &self.hook {
            hook(&event);
        }
    }

    // =========================================================================
    // Transitions and loading
    // =========================================================================

    /// Wait for the next identity notification and process it.
    ///
    /// Returns `false` once the identity provider has gone away.
    pub async fn watch_identity(&self) -> bool {
        let mut watcher = self.watcher.lock().await;
        if watcher.changed().await.is_none() {
            return false;
        }
        drop(watcher);
        self.sync().await;
        true
    }

    /// Process the currently observed identity.
    ///
    /// Runs the exit actions of a detected transition and loads the cart
    /// for the new identity. Does nothing if the identity is unresolved,
    /// already loaded, or being loaded.
    #[instrument(skip(self))]
    pub async fn sync(&self) {
        let IdentityState::Resolved(next) = self.identity.current() else {
            let mut inner = self.lock();
            if inner.phase == SyncPhase::Uninitialized {
                inner.phase = SyncPhase::AwaitingIdentity;
            }
            tracing::debug!("identity not yet resolved");
            return;
        };

        if let Some(epoch) = self.enter_epoch(&next) {
            self.load(&next, epoch).await;
        }
    }

    /// Exit actions: reset memory and load state, clear the device cart on
    /// logout and account switch. Returns the new epoch, or `None` if there
    /// is nothing to load.
    fn enter_epoch(&self, next: &Identity) -> Option<u64> {
        let (transition, from, epoch) = {
            let mut inner = self.lock();
            let transition = Transition::classify(inner.state.tracked_identity.as_ref(), next);
            if transition == Transition::Unchanged
                && (inner.state.has_completed_initial_load || inner.phase.is_loading())
            {
                return None;
            }
            let from = inner.state.tracked_identity.clone();
            inner.cart.clear();
            inner.state.begin_epoch(next.clone());
            inner.phase = SyncPhase::AwaitingIdentity;
            (transition, from, inner.state.epoch)
        };

        if transition == Transition::Unchanged {
            // A previous load for this identity was discarded
            tracing::debug!(identity = %next, "reloading cart");
            return Some(epoch);
        }

        tracing::info!(
            %transition,
            from = ?from,
            to = %next,
            "identity transition"
        );

        if transition.clears_local() {
            self.clear_local();
        }

        self.emit(SyncEvent::TransitionDetected {
            transition,
            from,
            to: next.clone(),
        });
        Some(epoch)
    }

    async fn load(&self, identity: &Identity, epoch: u64) {
        match identity {
            Identity::Anonymous => {
                self.set_phase(epoch, SyncPhase::LoadingAnonymous);
                let cart = self.read_local().unwrap_or_default();
                self.complete_load(identity, epoch, cart, false);
            }
            Identity::User(user) => self.load_authenticated(identity, user, epoch).await,
        }
    }

    async fn load_authenticated(&self, identity: &Identity, user: &UserId, epoch: u64) {
        self.set_phase(epoch, SyncPhase::LoadingAuthenticated(user.clone()));
        let fetched = self.remote.fetch(user).await;

        if !self.is_current(identity, epoch) {
            self.discard_load(identity, epoch);
            return;
        }

        let remote_cart = match fetched {
            Ok(cart) => cart,
            Err(e) => {
                // Degraded: serve and keep writing the device cart, so the
                // account cart is merged with it on a later login
                tracing::warn!(user = %user, error = %e, "cart fetch failed, using device cart");
                self.emit(SyncEvent::RemoteUnavailable {
                    op: RemoteOp::Fetch,
                    reason: e.to_string(),
                });
                let cart = self.read_local().unwrap_or_default();
                self.complete_load(identity, epoch, cart, true);
                return;
            }
        };

        let Some(local_cart) = self.read_local().filter(|cart| !cart.is_empty()) else {
            self.complete_load(identity, epoch, remote_cart, false);
            return;
        };

        let merged = merge(&remote_cart, &local_cart);
        {
            let mut inner = self.lock();
            if inner.state.epoch == epoch {
                inner.phase = SyncPhase::MergingOnLogin(user.clone());
                inner.cart = merged.clone();
            }
        }
        tracing::info!(
            user = %user,
            remote_items = remote_cart.len(),
            local_items = local_cart.len(),
            merged_items = merged.len(),
            "merged device cart into account cart"
        );
        self.emit(SyncEvent::Merged {
            user: user.clone(),
            items: merged.len(),
        });

        match self.remote.replace(user, &merged).await {
            Ok(()) => {
                self.emit(SyncEvent::WrittenBack {
                    target: WriteTarget::Remote(user.clone()),
                    items: merged.len(),
                });
                // Only now is it safe to forget the guest items
                self.clear_local();
            }
            Err(e) => {
                tracing::warn!(
                    user = %user,
                    error = %e,
                    "failed to save merged cart, keeping device cart for retry"
                );
                self.emit(SyncEvent::RemoteUnavailable {
                    op: RemoteOp::Replace,
                    reason: e.to_string(),
                });
                self.emit(SyncEvent::LocalRetainedAfterFailedMerge { user: user.clone() });
            }
        }

        if !self.is_current(identity, epoch) {
            self.discard_load(identity, epoch);
            return;
        }
        self.complete_load(identity, epoch, merged, false);
    }

    fn set_phase(&self, epoch: u64, phase: SyncPhase) {
        let mut inner = self.lock();
        if inner.state.epoch == epoch {
            inner.phase = phase;
        }
    }

    /// Install the loaded cart. Anything mutated in memory during the load
    /// is replaced.
    fn complete_load(&self, identity: &Identity, epoch: u64, cart: CartSnapshot, degraded: bool) {
        let items = cart.len();
        {
            let mut inner = self.lock();
            if inner.state.epoch != epoch {
                drop(inner);
                self.discard_load(identity, epoch);
                return;
            }
            inner.cart = cart;
            inner.state.has_completed_initial_load = true;
            inner.state.degraded = degraded;
            inner.phase = SyncPhase::Synced;
        }
        tracing::info!(identity = %identity, items, degraded, "cart loaded");
        self.emit(SyncEvent::LoadCompleted {
            identity: identity.clone(),
            items,
        });
    }

    fn discard_load(&self, identity: &Identity, epoch: u64) {
        tracing::info!(identity = %identity, "identity changed during load, discarding result");
        self.set_phase(epoch, SyncPhase::AwaitingIdentity);
        self.emit(SyncEvent::StaleLoadDiscarded {
            identity: identity.clone(),
        });
    }

    /// Whether a load begun in `epoch` for `identity` may still be applied.
    fn is_current(&self, identity: &Identity, epoch: u64) -> bool {
        self.identity.current().identity() == Some(identity) && self.lock().state.epoch == epoch
    }

    /// Read the device cart; unreadable data counts as no cart.
    fn read_local(&self) -> Option<CartSnapshot> {
        match self.local.load() {
            Ok(cart) => cart,
            Err(e) => {
                tracing::warn!(error = %e, "device cart unreadable, treating as empty");
                let reason = match e {
                    LocalStoreError::Corrupt(reason) => reason,
                    other => other.to_string(),
                };
                self.emit(SyncEvent::StorageCorrupt { reason });
                None
            }
        }
    }

    fn clear_local(&self) {
        if let Err(e) = self.local.clear() {
            tracing::warn!(error = %e, "failed to clear device cart");
            self.emit(SyncEvent::LocalWriteFailed {
                reason: e.to_string(),
            });
        }
    }

    // =========================================================================
    // Mutations and write-back
    // =========================================================================

    /// Apply a mutation to the in-memory cart and write the result back.
    ///
    /// A mutation that leaves the cart unchanged is not written.
    pub async fn mutate<T>(&self, f: impl FnOnce(&mut CartSnapshot) -> T) -> T {
        let (result, changed) = {
            let mut inner = self.lock();
            let before = inner.cart.clone();
            let result = f(&mut inner.cart);
            let changed = inner.cart != before;
            (result, changed)
        };
        if changed {
            self.write_back().await;
        }
        result
    }

    /// Persist the in-memory cart to the authoritative store, if the write
    /// gate allows it. Returns whether a store accepted the write.
    #[instrument(skip(self))]
    pub async fn write_back(&self) -> bool {
        let Some((target, cart)) = self.pass_write_gate() else {
            return false;
        };

        match target {
            WriteTarget::Local => match self.local.save(&cart) {
                Ok(()) => {
                    self.emit(SyncEvent::WrittenBack {
                        target: WriteTarget::Local,
                        items: cart.len(),
                    });
                    true
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to save device cart");
                    self.emit(SyncEvent::LocalWriteFailed {
                        reason: e.to_string(),
                    });
                    false
                }
            },
            WriteTarget::Remote(user) => match self.remote.replace(&user, &cart).await {
                Ok(()) => {
                    self.emit(SyncEvent::WrittenBack {
                        target: WriteTarget::Remote(user),
                        items: cart.len(),
                    });
                    true
                }
                Err(e) => {
                    tracing::warn!(user = %user, error = %e, "failed to save cart");
                    self.emit(SyncEvent::RemoteUnavailable {
                        op: RemoteOp::Replace,
                        reason: e.to_string(),
                    });
                    false
                }
            },
        }
    }

    /// Empty the cart and drop it from the authoritative store.
    ///
    /// For a signed-in user this is an explicit remote clear rather than a
    /// write of an empty cart. Subject to the same gate as write-back.
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        self.lock().cart.clear();
        let Some((target, _)) = self.pass_write_gate() else {
            return;
        };

        match target {
            WriteTarget::Local => match self.local.clear() {
                Ok(()) => self.emit(SyncEvent::Cleared {
                    target: WriteTarget::Local,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to clear device cart");
                    self.emit(SyncEvent::LocalWriteFailed {
                        reason: e.to_string(),
                    });
                }
            },
            WriteTarget::Remote(user) => match self.remote.clear(&user).await {
                Ok(()) => self.emit(SyncEvent::Cleared {
                    target: WriteTarget::Remote(user),
                }),
                Err(e) => {
                    tracing::warn!(user = %user, error = %e, "failed to clear cart");
                    self.emit(SyncEvent::RemoteUnavailable {
                        op: RemoteOp::Clear,
                        reason: e.to_string(),
                    });
                }
            },
        }
    }

    /// Where to write and what, or `None` if the gate is closed.
    fn pass_write_gate(&self) -> Option<(WriteTarget, CartSnapshot)> {
        let observed = self.identity.current();
        let reason = {
            let inner = self.lock();
            if let Some(identity) = observed.identity()
                && inner.state.permits_write(Some(identity))
            {
                return Some((inner.state.write_target(identity), inner.cart.clone()));
            }

            if inner.state.has_completed_initial_load {
                SuppressReason::IdentityMismatch {
                    tracked: inner.state.tracked_identity.clone(),
                    observed: observed.identity().cloned(),
                }
            } else {
                SuppressReason::LoadIncomplete
            }
        };
        tracing::debug!(?reason, "write suppressed");
        self.emit(SyncEvent::StaleWriteSuppressed { reason });
        None
    }
}
