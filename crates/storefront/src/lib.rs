//! Suburbia Storefront library.
//!
//! Server side of cart sync: the `/api/cart` resource backing signed-in
//! users' carts. Exposed as a library so the binary, the CLI migrations, and
//! the integration tests share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::StorefrontConfig;
pub use state::AppState;

/// Build the storefront application with its state attached.
pub fn app(state: AppState) -> axum::Router {
    routes::routes().with_state(state)
}
