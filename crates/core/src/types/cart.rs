//! Cart items and cart snapshots.
//!
//! A [`CartSnapshot`] is the full content of one cart at one instant. It is
//! the unit that gets loaded, merged, and written back by the sync engine,
//! and the body of the `/api/cart` resource.
//!
//! # Invariants
//!
//! - Item ids are unique within a snapshot.
//! - Quantities are at least 1. Lowering a quantity to zero or below removes
//!   the item instead.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{CartItemId, ComponentId};
use super::price::Price;

/// A component described by a texture (deck, wheel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexturedPart {
    pub id: ComponentId,
    pub name: String,
    /// Texture image URL.
    pub texture: String,
}

/// A component described by a color (truck, bolt).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColoredPart {
    pub id: ComponentId,
    pub name: String,
    /// CSS color value, e.g. `#6F6E6A`.
    pub color: String,
}

/// A configured board before it has a quantity.
///
/// This is what the board builder hands to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemDraft {
    pub id: CartItemId,
    pub deck: TexturedPart,
    pub wheel: TexturedPart,
    pub truck: ColoredPart,
    pub bolt: ColoredPart,
    pub price: Price,
}

impl CartItemDraft {
    /// Build a draft, deriving its id from the chosen component ids.
    #[must_use]
    pub fn new(
        deck: TexturedPart,
        wheel: TexturedPart,
        truck: ColoredPart,
        bolt: ColoredPart,
        price: Price,
    ) -> Self {
        let id = Self::composite_id(&deck.id, &wheel.id, &truck.id, &bolt.id);
        Self {
            id,
            deck,
            wheel,
            truck,
            bolt,
            price,
        }
    }

    /// The deterministic item key for a component combination.
    #[must_use]
    pub fn composite_id(
        deck: &ComponentId,
        wheel: &ComponentId,
        truck: &ComponentId,
        bolt: &ComponentId,
    ) -> CartItemId {
        CartItemId::new(format!("{deck}-{wheel}-{truck}-{bolt}"))
    }

    fn into_item(self, quantity: NonZeroU32) -> CartItem {
        CartItem {
            id: self.id,
            deck: self.deck,
            wheel: self.wheel,
            truck: self.truck,
            bolt: self.bolt,
            price: self.price,
            quantity,
        }
    }
}

/// One line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub deck: TexturedPart,
    pub wheel: TexturedPart,
    pub truck: ColoredPart,
    pub bolt: ColoredPart,
    /// Unit price.
    pub price: Price,
    pub quantity: NonZeroU32,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_price(&self) -> Price {
        self.price.times(u64::from(self.quantity.get()))
    }
}

/// Validation failures for a cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Two items share the same id.
    #[error("duplicate cart item id: {0}")]
    DuplicateItem(CartItemId),

    /// An item has an empty id.
    #[error("cart item id must not be empty")]
    EmptyItemId,
}

/// Result of [`CartSnapshot::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was appended with quantity 1.
    Added,
    /// An existing line's quantity went up by one.
    Incremented,
}

/// Result of [`CartSnapshot::update_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityOutcome {
    Updated,
    /// The requested quantity was zero or negative.
    Removed,
    /// No item with that id.
    Missing,
}

/// The items of one cart, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    items: Vec<CartItem>,
}

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a snapshot from items, checking the snapshot invariants.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if an id is empty or appears twice.
    pub fn from_items(items: Vec<CartItem>) -> Result<Self, CartError> {
        let snapshot = Self { items };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check the snapshot invariants.
    ///
    /// Deserialization alone cannot enforce id uniqueness, so anything read
    /// from storage or the network goes through here.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if an id is empty or appears twice.
    pub fn validate(&self) -> Result<(), CartError> {
        let mut seen = std::collections::HashSet::with_capacity(self.items.len());
        for item in &self.items {
            if item.id.as_str().is_empty() {
                return Err(CartError::EmptyItemId);
            }
            if !seen.insert(&item.id) {
                return Err(CartError::DuplicateItem(item.id.clone()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Look up an item by id.
    #[must_use]
    pub fn get(&self, id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Add one unit of a configured board.
    pub fn add(&mut self, draft: CartItemDraft) -> AddOutcome {
        if let Some(existing) = self.items.iter_mut().find(|item| item.id == draft.id) {
            existing.quantity = existing.quantity.saturating_add(1);
            AddOutcome::Incremented
        } else {
            self.items.push(draft.into_item(NonZeroU32::MIN));
            AddOutcome::Added
        }
    }

    /// Append an item, or sum its quantity into the line with the same id.
    pub(crate) fn absorb(&mut self, item: &CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|line| line.id == item.id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity.get());
        } else {
            self.items.push(item.clone());
        }
    }

    /// Remove the item with this id. Returns `false` if it was absent.
    pub fn remove(&mut self, id: &CartItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        self.items.len() != before
    }

    /// Set an item's quantity; zero or negative removes it.
    pub fn update_quantity(&mut self, id: &CartItemId, quantity: i64) -> QuantityOutcome {
        let Some(quantity) = u32::try_from(quantity.max(0)).ok().and_then(NonZeroU32::new) else {
            return if quantity > 0 {
                // Larger than u32::MAX: clamp rather than drop the line.
                self.set_quantity(id, NonZeroU32::MAX)
            } else if self.remove(id) {
                QuantityOutcome::Removed
            } else {
                QuantityOutcome::Missing
            };
        };
        self.set_quantity(id, quantity)
    }

    fn set_quantity(&mut self, id: &CartItemId, quantity: NonZeroU32) -> QuantityOutcome {
        match self.items.iter_mut().find(|item| &item.id == id) {
            Some(item) => {
                item.quantity = quantity;
                QuantityOutcome::Updated
            }
            None => QuantityOutcome::Missing,
        }
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }

    /// Sum of price times quantity over all items.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartItem::line_price).sum()
    }
}

impl From<CartSnapshot> for Vec<CartItem> {
    fn from(snapshot: CartSnapshot) -> Self {
        snapshot.items
    }
}
