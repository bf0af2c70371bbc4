//! Observable sync events.
//!
//! Every decision the controller makes that is otherwise silent (a write
//! suppressed by the gate, a corrupt device cart treated as empty, a late
//! fetch discarded) is emitted as a [`SyncEvent`] to an optional hook, in
//! addition to being logged.

use std::fmt;
use std::sync::Arc;

use suburbia_core::{Identity, UserId};

use crate::state::Transition;

/// Callback receiving every [`SyncEvent`].
pub type EventHook = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Remote store operation, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Fetch,
    Replace,
    Clear,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Replace => "replace",
            Self::Clear => "clear",
        })
    }
}

/// Which store a write went to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    Local,
    Remote(UserId),
}

/// Why the write gate rejected a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressReason {
    /// The initial load for the tracked identity has not completed.
    LoadIncomplete,
    /// The observed identity is not the one the load completed for.
    IdentityMismatch {
        tracked: Option<Identity>,
        observed: Option<Identity>,
    },
}

/// Something the controller did or declined to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// An identity change was detected and its exit actions ran.
    TransitionDetected {
        transition: Transition,
        from: Option<Identity>,
        to: Identity,
    },
    /// The initial load for an identity completed.
    LoadCompleted { identity: Identity, items: usize },
    /// The device cart was merged into a user's remote cart.
    Merged { user: UserId, items: usize },
    /// The device cart could not be decoded and was treated as empty.
    StorageCorrupt { reason: String },
    /// The device cart could not be written or cleared.
    LocalWriteFailed { reason: String },
    /// A remote store call failed.
    RemoteUnavailable { op: RemoteOp, reason: String },
    /// The write gate rejected a write; no store call was made.
    StaleWriteSuppressed { reason: SuppressReason },
    /// A load finished after the identity had moved on; its result was dropped.
    StaleLoadDiscarded { identity: Identity },
    /// The merged cart could not be written, so the device cart was kept.
    LocalRetainedAfterFailedMerge { user: UserId },
    /// The cart was persisted.
    WrittenBack { target: WriteTarget, items: usize },
    /// The cart was explicitly cleared in its store.
    Cleared { target: WriteTarget },
}
