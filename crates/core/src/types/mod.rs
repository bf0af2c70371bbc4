//! Core types for Suburbia.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod identity;
pub mod price;

pub use cart::{
    AddOutcome, CartError, CartItem, CartItemDraft, CartSnapshot, ColoredPart, QuantityOutcome,
    TexturedPart,
};
pub use id::*;
pub use identity::Identity;
pub use price::{BASE_PRICE, Price};
