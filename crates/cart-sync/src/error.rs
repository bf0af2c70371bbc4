//! Store error types.
//!
//! None of these are fatal: the controller recovers from every one of them
//! and reports it through [`crate::events::SyncEvent`].

use thiserror::Error;

use suburbia_core::CartError;

/// Errors from the device-local cart store.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    /// Reading or writing the backing file failed.
    #[error("local storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored value is not a valid cart snapshot.
    #[error("stored cart is corrupt: {0}")]
    Corrupt(String),

    /// Serializing the cart failed.
    #[error("failed to encode cart: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<CartError> for LocalStoreError {
    fn from(err: CartError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Errors from the remote cart store.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// The request could not be sent or the response not read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store rejected the caller's identity.
    #[error("unauthorized")]
    Unauthorized,

    /// The store answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The store answered with a body that is not a valid cart.
    #[error("invalid cart payload: {0}")]
    Invalid(String),

    /// The configured base URL cannot be joined with the cart path.
    #[error("invalid base URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<CartError> for RemoteStoreError {
    fn from(err: CartError) -> Self {
        Self::Invalid(err.to_string())
    }
}
