//! User-facing cart operations.
//!
//! [`Cart`] is what the rest of the application talks to. Every operation
//! edits the in-memory cart held by the [`SyncController`] and lets the
//! controller persist the result; nothing here touches a store directly.

use tracing::instrument;

use suburbia_core::{
    AddOutcome, CartItem, CartItemDraft, CartItemId, CartSnapshot, Price, QuantityOutcome,
};

use crate::controller::SyncController;
use crate::events::EventHook;
use crate::identity::IdentityObserver;
use crate::local::LocalCartStore;
use crate::remote::RemoteCartStore;

/// The shopping cart, kept in sync with the store of the current identity.
#[derive(Debug)]
pub struct Cart<L, R> {
    controller: SyncController<L, R>,
}

impl<L, R> Cart<L, R>
where
    L: LocalCartStore,
    R: RemoteCartStore,
{
    #[must_use]
    pub fn new(local: L, remote: R, identity: IdentityObserver) -> Self {
        Self::from_controller(SyncController::new(local, remote, identity))
    }

    #[must_use]
    pub const fn from_controller(controller: SyncController<L, R>) -> Self {
        Self { controller }
    }

    #[must_use]
    pub fn with_event_hook(self, hook: EventHook) -> Self {
        Self {
            controller: self.controller.with_event_hook(hook),
        }
    }

    #[must_use]
    pub const fn controller(&self) -> &SyncController<L, R> {
        &self.controller
    }

    /// Process the current identity (see [`SyncController::sync`]).
    pub async fn sync(&self) {
        self.controller.sync().await;
    }

    /// Wait for and process the next identity change.
    pub async fn watch_identity(&self) -> bool {
        self.controller.watch_identity().await
    }

    /// Whether the cart for the current identity has finished loading.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.controller.state().has_completed_initial_load
    }

    /// A copy of the cart as it is right now.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.controller.cart()
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.controller.with_cart(|cart| cart.items().to_vec())
    }

    /// Add one board; a board already in the cart gets its quantity bumped.
    #[instrument(skip(self, draft), fields(item = %draft.id))]
    pub async fn add_item(&self, draft: CartItemDraft) -> AddOutcome {
        let outcome = self.controller.mutate(|cart| cart.add(draft)).await;
        match outcome {
            AddOutcome::Added => tracing::info!("added to cart"),
            AddOutcome::Incremented => tracing::info!("updated quantity in cart"),
        }
        outcome
    }

    /// Remove a line. Returns `false` if it was not in the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, id: &CartItemId) -> bool {
        self.controller.mutate(|cart| cart.remove(id)).await
    }

    /// Set a line's quantity. Zero or negative removes the line.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, id: &CartItemId, quantity: i64) -> QuantityOutcome {
        self.controller
            .mutate(|cart| cart.update_quantity(id, quantity))
            .await
    }

    /// Empty the cart and drop it from its store.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) {
        self.controller.clear().await;
    }

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.controller.with_cart(CartSnapshot::total_items)
    }

    /// Sum of price times quantity.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.controller.with_cart(CartSnapshot::total_price)
    }
}
