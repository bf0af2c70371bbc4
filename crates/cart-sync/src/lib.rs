//! Suburbia cart synchronization engine.
//!
//! Reconciles the device-local anonymous cart with the account-scoped cart
//! held by the storefront across login, logout, and account switches.
//!
//! # Components
//!
//! - [`identity`] - Observes the resolved identity and notifies on change
//! - [`local`] - Device-local cart storage (one anonymous cart)
//! - [`remote`] - Account-scoped cart storage behind `/api/cart`
//! - [`state`] - Transition classification and sync phases
//! - [`controller`] - The state machine that loads, merges, and writes back
//! - [`cart`] - The user-facing cart operations
//!
//! # Example
//!
//! ```rust,ignore
//! use suburbia_cart_sync::{Cart, FileCartStore, HttpCartStore, identity_channel};
//! use suburbia_core::Identity;
//!
//! let (publisher, observer) = identity_channel();
//! let local = FileCartStore::new(data_dir);
//! let remote = HttpCartStore::new(base_url)?;
//! let cart = Cart::new(local, remote, observer);
//!
//! publisher.publish_identity(Identity::user("user_123"));
//! cart.sync().await;
//! cart.add_item(draft).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod controller;
pub mod error;
pub mod events;
pub mod identity;
pub mod local;
pub mod remote;
pub mod state;

pub use cart::Cart;
pub use controller::SyncController;
pub use error::{LocalStoreError, RemoteStoreError};
pub use events::{EventHook, RemoteOp, SuppressReason, SyncEvent, WriteTarget};
pub use identity::{
    IdentityObserver, IdentityPublisher, IdentityState, ProviderSnapshot, identity_channel,
};
pub use local::{FileCartStore, LOCAL_CART_KEY, LocalCartStore, MemoryCartStore};
pub use remote::{DEFAULT_IDENTITY_HEADER, HttpCartStore, RemoteCartStore};
pub use state::{SyncPhase, SyncState, Transition};
