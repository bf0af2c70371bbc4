//! Cart repository for database operations.
//!
//! Each signed-in user has at most one row. The items column holds the
//! JSON array that `/api/cart` exchanges, so a cart is always read and
//! written whole.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use suburbia_core::{CartItem, CartSnapshot, UserId};

use super::RepositoryError;

/// A cart row.
#[derive(Debug, Clone)]
pub struct StoredCart {
    pub user_id: UserId,
    pub cart: CartSnapshot,
    pub updated_at: DateTime<Utc>,
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored items do not decode
    /// or break the cart invariants.
    pub async fn get(&self, user_id: &UserId) -> Result<Option<StoredCart>, RepositoryError> {
        let row: Option<(serde_json::Value, DateTime<Utc>)> = sqlx::query_as(
            r"
            SELECT items, updated_at
            FROM storefront.cart
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|(items, updated_at)| {
            Ok(StoredCart {
                user_id: user_id.clone(),
                cart: decode_items(items)?,
                updated_at,
            })
        })
        .transpose()
    }

    /// Insert or overwrite a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn replace(
        &self,
        user_id: &UserId,
        cart: &CartSnapshot,
    ) -> Result<DateTime<Utc>, RepositoryError> {
        let updated_at: DateTime<Utc> = sqlx::query_scalar(
            r"
            INSERT INTO storefront.cart (user_id, items)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET items = EXCLUDED.items, updated_at = now()
            RETURNING updated_at
            ",
        )
        .bind(user_id.as_str())
        .bind(Json(cart.items()))
        .fetch_one(self.pool)
        .await?;

        Ok(updated_at)
    }

    /// Delete a user's cart. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Decode the items column into a validated snapshot.
fn decode_items(items: serde_json::Value) -> Result<CartSnapshot, RepositoryError> {
    let items: Vec<CartItem> = serde_json::from_value(items)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid cart items: {e}")))?;
    CartSnapshot::from_items(items)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid cart in database: {e}")))
}
