//! Cart API handlers.
//!
//! The remote half of cart sync: one whole-cart resource per signed-in user.
//! Clients read it after login, replace it after every change, and delete
//! it when the shopper empties the cart.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::instrument;

use suburbia_core::CartSnapshot;

use crate::db::CartRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::state::AppState;

/// `GET /api/cart` - the user's cart, empty if none is stored.
#[instrument(skip(state), fields(user_id = %user))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartSnapshot>> {
    let stored = CartRepository::new(state.pool()).get(&user).await?;
    let cart = stored.map(|s| s.cart).unwrap_or_default();
    tracing::debug!(items = cart.len(), "cart fetched");
    Ok(Json(cart))
}

/// `PUT /api/cart` - overwrite the user's cart.
#[instrument(skip(state, body), fields(user_id = %user))]
pub async fn replace(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    body: std::result::Result<Json<CartSnapshot>, JsonRejection>,
) -> Result<Json<CartSnapshot>> {
    let Json(cart) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    cart.validate()?;

    CartRepository::new(state.pool())
        .replace(&user, &cart)
        .await?;

    tracing::info!(
        items = cart.len(),
        quantity = cart.total_items(),
        "cart replaced"
    );
    Ok(Json(cart))
}

/// `DELETE /api/cart` - drop the user's cart.
#[instrument(skip(state), fields(user_id = %user))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<StatusCode> {
    let existed = CartRepository::new(state.pool()).delete(&user).await?;
    tracing::info!(existed, "cart cleared");
    Ok(StatusCode::NO_CONTENT)
}
