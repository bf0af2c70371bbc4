//! Identity extractors.
//!
//! The storefront does not authenticate anyone itself. The identity gateway
//! in front of it verifies the session and forwards the user id in a header
//! (`x-suburbia-user` by default, see [`StorefrontConfig`]). Requests that
//! reach a cart route without it are anonymous, and anonymous carts never
//! leave the device.
//!
//! [`StorefrontConfig`]: crate::config::StorefrontConfig

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tracing::Span;

use suburbia_core::UserId;

use crate::error::set_sentry_user;
use crate::state::AppState;

/// Longest user id accepted from the gateway.
const MAX_USER_ID_LEN: usize = 256;

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("cart of {user}")
/// }
/// ```
pub struct RequireUser(pub UserId);

/// Error returned when a route requires a user and the request has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRejection {
    /// The identity header is absent.
    Missing,
    /// The identity header is present but not a usable id.
    Invalid,
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Missing => "Unauthorized: sign in to use a saved cart",
            Self::Invalid => "Unauthorized: invalid identity",
        };
        (StatusCode::UNAUTHORIZED, message).into_response()
    }
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = IdentityRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(state.identity_header())
            .ok_or(IdentityRejection::Missing)?;

        let user_id = value
            .to_str()
            .ok()
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_USER_ID_LEN)
            .map(UserId::new)
            .ok_or(IdentityRejection::Invalid)?;

        Span::current().record("user_id", user_id.as_str());
        set_sentry_user(&user_id);

        Ok(Self(user_id))
    }
}
