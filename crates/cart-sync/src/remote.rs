//! Account-scoped cart storage.
//!
//! The remote store is owned by the storefront service. The engine only
//! needs three operations on it: read, replace, and clear the cart of one
//! user. [`HttpCartStore`] implements them against the storefront's
//! `/api/cart` resource.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::instrument;
use url::Url;

use suburbia_core::{CartSnapshot, UserId};

use crate::error::RemoteStoreError;

/// Header carrying the caller's user id, as set by the identity gateway.
pub const DEFAULT_IDENTITY_HEADER: &str = "x-suburbia-user";

const CART_PATH: &str = "api/cart";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Network-accessible persistence scoped to an authenticated user.
///
/// Every call may fail transiently; callers must treat failures as
/// recoverable.
pub trait RemoteCartStore {
    /// Read the user's cart. A user without a stored cart gets an empty one.
    fn fetch(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<CartSnapshot, RemoteStoreError>> + Send;

    /// Replace the user's cart with `cart`.
    fn replace(
        &self,
        user: &UserId,
        cart: &CartSnapshot,
    ) -> impl Future<Output = Result<(), RemoteStoreError>> + Send;

    /// Drop the user's stored cart.
    fn clear(&self, user: &UserId) -> impl Future<Output = Result<(), RemoteStoreError>> + Send;
}

impl<T: RemoteCartStore> RemoteCartStore for Arc<T> {
    fn fetch(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<CartSnapshot, RemoteStoreError>> + Send {
        (**self).fetch(user)
    }

    fn replace(
        &self,
        user: &UserId,
        cart: &CartSnapshot,
    ) -> impl Future<Output = Result<(), RemoteStoreError>> + Send {
        (**self).replace(user, cart)
    }

    fn clear(&self, user: &UserId) -> impl Future<Output = Result<(), RemoteStoreError>> + Send {
        (**self).clear(user)
    }
}

// =============================================================================
// HttpCartStore
// =============================================================================

/// Client for the storefront's `/api/cart` resource.
///
/// ```text
/// GET    /api/cart   -> { "items": [...] }
/// PUT    /api/cart   <- { "items": [...] }
/// DELETE /api/cart
/// ```
#[derive(Debug, Clone)]
pub struct HttpCartStore {
    client: reqwest::Client,
    endpoint: Url,
    identity_header: String,
}

impl HttpCartStore {
    /// Create a client for the storefront at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteStoreError::Url` if `base_url` is not a valid URL and
    /// `RemoteStoreError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, RemoteStoreError> {
        let mut base = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(CART_PATH)?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
        })
    }

    /// Use a preconfigured HTTP client (proxies, cookies, TLS roots).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Override the identity header name.
    #[must_use]
    pub fn with_identity_header(mut self, name: impl Into<String>) -> Self {
        self.identity_header = name.into();
        self
    }

    /// The full URL of the cart resource.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, method: reqwest::Method, user: &UserId) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.endpoint.clone())
            .header(self.identity_header.as_str(), user.as_str())
    }
}

/// Map non-success responses to errors.
async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, RemoteStoreError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(RemoteStoreError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "cart store returned non-success status"
        );
        return Err(RemoteStoreError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }
    Ok(response)
}

impl RemoteCartStore for HttpCartStore {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self, user: &UserId) -> Result<CartSnapshot, RemoteStoreError> {
        let response = self.request(reqwest::Method::GET, user).send().await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;

        let cart: CartSnapshot = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "failed to parse cart response"
            );
            RemoteStoreError::Invalid(e.to_string())
        })?;
        cart.validate()?;
        Ok(cart)
    }

    #[instrument(skip(self, cart), fields(endpoint = %self.endpoint, items = cart.len()))]
    async fn replace(&self, user: &UserId, cart: &CartSnapshot) -> Result<(), RemoteStoreError> {
        let response = self
            .request(reqwest::Method::PUT, user)
            .json(cart)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn clear(&self, user: &UserId) -> Result<(), RemoteStoreError> {
        let response = self.request(reqwest::Method::DELETE, user).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}
