//! Who owns a cart.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// A resolved identity as reported by the identity provider.
///
/// The "not yet resolved" state is deliberately not a variant here; it is
/// modeled by the identity observer so that it can never be confused with
/// `Anonymous`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    /// No signed-in user; the cart lives on the device.
    Anonymous,
    /// A signed-in user; the cart lives in the remote store.
    User(UserId),
}

impl Identity {
    /// Shorthand for `Identity::User(UserId::new(id))`.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(UserId::new(id))
    }

    /// The user id, if signed in.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id),
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}
