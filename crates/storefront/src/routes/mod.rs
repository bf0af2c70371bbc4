//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Liveness check
//! GET    /health/ready         - Readiness check (database)
//!
//! # Cart (requires identity header)
//! GET    /api/cart             - Fetch the user's cart
//! PUT    /api/cart             - Replace the user's cart
//! DELETE /api/cart             - Delete the user's cart
//! ```

pub mod cart;
pub mod health;

use axum::{Router, extract::Request, middleware::from_fn, routing::get};
use tower_http::trace::TraceLayer;
use tracing::field::Empty;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the cart API router.
pub fn cart_routes() -> Router<AppState> {
    Router::new().route(
        "/",
        get(cart::show).put(cart::replace).delete(cart::clear),
    )
}

/// Build the complete application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/cart", cart_routes())
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = Empty,
                user_id = Empty,
            )
        }))
}
