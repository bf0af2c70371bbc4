//! Suburbia Core - Shared cart types and the merge engine.
//!
//! This crate provides the types used across all Suburbia components:
//! - `cart-sync` - Device-side cart synchronization engine
//! - `storefront` - Remote cart store HTTP service
//! - `cli` - Command-line tools for migrations and cart sessions
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used on both sides of the wire.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, identities, and cart snapshots
//! - [`merge`] - Deterministic combination of a remote and a local cart

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod merge;
pub mod types;

pub use merge::merge;
pub use types::*;
