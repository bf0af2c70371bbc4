//! Integration tests for Suburbia.
//!
//! # Running Tests
//!
//! ```bash
//! # Cart sync scenarios (no services needed)
//! cargo test -p suburbia-integration-tests
//!
//! # Live storefront tests
//! cargo run -p suburbia-cli -- migrate storefront
//! cargo run -p suburbia-storefront &
//! cargo test -p suburbia-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_sync_flows` - Sync engine scenarios against recording stores
//! - `storefront_cart_api` - `/api/cart` against a running storefront
//!
//! This library holds the shared fixtures: stores that record every call
//! into one [`Journal`], so tests can assert the order of local and remote
//! operations, and a [`FetchGate`] for holding a remote fetch in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

use suburbia_cart_sync::{
    EventHook, LocalCartStore, LocalStoreError, MemoryCartStore, RemoteCartStore,
    RemoteStoreError, SyncEvent,
};
use suburbia_core::{
    BASE_PRICE, CartItemDraft, CartSnapshot, ColoredPart, ComponentId, TexturedPart, UserId,
};

/// Base URL for the storefront (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A board built from four component ids, at the base price.
#[must_use]
pub fn board(deck: &str, wheel: &str, truck: &str, bolt: &str) -> CartItemDraft {
    let textured = |id: &str| TexturedPart {
        id: ComponentId::new(id),
        name: id.to_string(),
        texture: format!("/images/{id}.png"),
    };
    let colored = |id: &str| ColoredPart {
        id: ComponentId::new(id),
        name: id.to_string(),
        color: "#6F6E6A".to_string(),
    };
    CartItemDraft::new(
        textured(deck),
        textured(wheel),
        colored(truck),
        colored(bolt),
        BASE_PRICE,
    )
}

/// A cart holding `quantity` of each listed board.
#[must_use]
pub fn cart_of(lines: &[(&CartItemDraft, u32)]) -> CartSnapshot {
    let mut cart = CartSnapshot::new();
    for (draft, quantity) in lines {
        for _ in 0..*quantity {
            cart.add((*draft).clone());
        }
    }
    cart
}

// =============================================================================
// Journal
// =============================================================================

/// One store call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    LocalLoad,
    LocalSave(CartSnapshot),
    LocalClear,
    RemoteFetch(UserId),
    RemoteReplace(UserId, CartSnapshot),
    RemoteClear(UserId),
}

impl StoreCall {
    /// Whether this call writes to a store.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::LocalSave(_) | Self::LocalClear | Self::RemoteReplace(..) | Self::RemoteClear(_)
        )
    }
}

/// Shared, ordered record of store calls.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: StoreCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Write calls only.
    #[must_use]
    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_write).collect()
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

// =============================================================================
// Event recorder
// =============================================================================

/// Collects [`SyncEvent`]s from a controller hook.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook that appends to this log.
    #[must_use]
    pub fn hook(&self) -> EventHook {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &SyncEvent| {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        })
    }

    #[must_use]
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any recorded event matches.
    pub fn any(&self, predicate: impl Fn(&SyncEvent) -> bool) -> bool {
        self.events().iter().any(predicate)
    }
}

// =============================================================================
// Recording local store
// =============================================================================

/// A device store that journals every call.
#[derive(Debug)]
pub struct RecordingLocalStore {
    inner: MemoryCartStore,
    journal: Journal,
}

impl RecordingLocalStore {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            inner: MemoryCartStore::new(),
            journal,
        }
    }

    /// Start with a raw stored value, bypassing validation.
    #[must_use]
    pub fn with_raw(journal: Journal, raw: impl Into<String>) -> Self {
        Self {
            inner: MemoryCartStore::with_raw(raw),
            journal,
        }
    }

    /// Seed the stored cart without journaling.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the cart cannot be encoded.
    pub fn seed(&self, cart: &CartSnapshot) -> Result<(), LocalStoreError> {
        self.inner.save(cart)
    }

    /// The stored cart, read without journaling. Unreadable data reads as `None`.
    #[must_use]
    pub fn peek(&self) -> Option<CartSnapshot> {
        self.inner.load().ok().flatten()
    }

    /// The raw stored value.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.inner.raw()
    }
}

impl LocalCartStore for RecordingLocalStore {
    fn load(&self) -> Result<Option<CartSnapshot>, LocalStoreError> {
        self.journal.record(StoreCall::LocalLoad);
        self.inner.load()
    }

    fn save(&self, cart: &CartSnapshot) -> Result<(), LocalStoreError> {
        self.journal.record(StoreCall::LocalSave(cart.clone()));
        self.inner.save(cart)
    }

    fn clear(&self) -> Result<(), LocalStoreError> {
        self.journal.record(StoreCall::LocalClear);
        self.inner.clear()
    }
}

// =============================================================================
// Scripted remote store
// =============================================================================

/// Holds a remote fetch in flight until released.
#[derive(Debug, Default)]
pub struct FetchGate {
    entered: Notify,
    release: Notify,
}

impl FetchGate {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until a fetch is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let the parked fetch complete.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// An account cart service with per-user carts and injectable failures.
#[derive(Debug, Default)]
pub struct ScriptedRemoteStore {
    carts: Mutex<HashMap<UserId, CartSnapshot>>,
    journal: Journal,
    offline: AtomicBool,
    fail_replace: AtomicBool,
    gate: Mutex<Option<Arc<FetchGate>>>,
}

impl ScriptedRemoteStore {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Store a cart for `user` without journaling.
    pub fn seed(&self, user: &str, cart: CartSnapshot) {
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(UserId::new(user), cart);
    }

    /// The cart stored for `user`.
    #[must_use]
    pub fn cart_for(&self, user: &str) -> Option<CartSnapshot> {
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&UserId::new(user))
            .cloned()
    }

    /// Make every call fail as if the service were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make replace calls fail.
    pub fn set_fail_replace(&self, fail: bool) {
        self.fail_replace.store(fail, Ordering::SeqCst);
    }

    /// Park the next fetch at `gate`.
    pub fn hold_next_fetch(&self, gate: Arc<FetchGate>) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(gate);
    }

    fn check_online(&self) -> Result<(), RemoteStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl RemoteCartStore for ScriptedRemoteStore {
    async fn fetch(&self, user: &UserId) -> Result<CartSnapshot, RemoteStoreError> {
        self.journal.record(StoreCall::RemoteFetch(user.clone()));

        let gate = self
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.check_online()?;
        Ok(self.cart_for(user.as_str()).unwrap_or_default())
    }

    async fn replace(&self, user: &UserId, cart: &CartSnapshot) -> Result<(), RemoteStoreError> {
        self.journal
            .record(StoreCall::RemoteReplace(user.clone(), cart.clone()));
        self.check_online()?;
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Status {
                status: 500,
                body: "write failed".to_string(),
            });
        }
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.clone(), cart.clone());
        Ok(())
    }

    async fn clear(&self, user: &UserId) -> Result<(), RemoteStoreError> {
        self.journal.record(StoreCall::RemoteClear(user.clone()));
        self.check_online()?;
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user);
        Ok(())
    }
}
