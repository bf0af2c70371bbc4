//! Login-time cart merge.
//!
//! When an anonymous shopper signs in, the cart they built on the device is
//! folded into the cart stored for their account:
//!
//! 1. Start from the remote items, in their original order.
//! 2. For each local item, sum its quantity into the remote line with the
//!    same id, or append it if there is none.
//!
//! The result lists remote items first, then local-only items in their
//! original order. `merge(r, empty) == r` and `merge(empty, l) == l`.

use crate::types::CartSnapshot;

/// Combine a remote and a local cart snapshot.
#[must_use]
pub fn merge(remote: &CartSnapshot, local: &CartSnapshot) -> CartSnapshot {
    let mut merged = remote.clone();
    for item in local.items() {
        merged.absorb(item);
    }
    merged
}
