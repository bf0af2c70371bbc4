//! Cart sync scenarios across login, logout, and account switches.
//!
//! Both stores journal into one shared log, so these tests check what was
//! written where and in which order, not just the final cart.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use suburbia_cart_sync::{
    Cart, IdentityPublisher, RemoteOp, SuppressReason, SyncEvent, SyncPhase, WriteTarget,
    identity_channel,
};
use suburbia_core::{AddOutcome, CartSnapshot, Identity, UserId};
use suburbia_integration_tests::{
    EventLog, FetchGate, Journal, RecordingLocalStore, ScriptedRemoteStore, StoreCall, board,
    cart_of,
};

type TestCart = Cart<Arc<RecordingLocalStore>, Arc<ScriptedRemoteStore>>;

struct Harness {
    publisher: IdentityPublisher,
    cart: TestCart,
    local: Arc<RecordingLocalStore>,
    remote: Arc<ScriptedRemoteStore>,
    journal: Journal,
    events: EventLog,
}

impl Harness {
    fn new() -> Self {
        let journal = Journal::new();
        Self::with_local(RecordingLocalStore::new(journal.clone()), journal)
    }

    fn with_local(local: RecordingLocalStore, journal: Journal) -> Self {
        let (publisher, observer) = identity_channel();
        let local = Arc::new(local);
        let remote = Arc::new(ScriptedRemoteStore::new(journal.clone()));
        let events = EventLog::new();
        let cart = Cart::new(Arc::clone(&local), Arc::clone(&remote), observer)
            .with_event_hook(events.hook());
        Self {
            publisher,
            cart,
            local,
            remote,
            journal,
            events,
        }
    }

    async fn become_identity(&self, identity: Identity) {
        self.publisher.publish_identity(identity);
        self.cart.sync().await;
    }

    fn quantities(&self) -> Vec<(String, u32)> {
        self.cart
            .items()
            .iter()
            .map(|item| (item.id.to_string(), item.quantity.get()))
            .collect()
    }
}

fn alice() -> Identity {
    Identity::user("alice")
}

fn user(id: &str) -> UserId {
    UserId::new(id)
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_merges_device_cart_into_account_cart() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    let b = board("b", "w", "t", "b");
    h.local.seed(&cart_of(&[(&a, 2)])).unwrap();
    h.remote.seed("alice", cart_of(&[(&a, 1), (&b, 1)]));

    h.become_identity(Identity::Anonymous).await;
    assert_eq!(h.cart.total_items(), 2);
    h.journal.reset();

    h.become_identity(alice()).await;

    let expected = cart_of(&[(&a, 3), (&b, 1)]);
    assert_eq!(&h.cart.snapshot(), &expected);
    assert_eq!(
        h.quantities(),
        vec![("a-w-t-b".to_string(), 3), ("b-w-t-b".to_string(), 1)]
    );

    // Exactly one remote write, and the device cart is cleared only after it
    assert_eq!(
        h.journal.writes(),
        vec![
            StoreCall::RemoteReplace(user("alice"), expected.clone()),
            StoreCall::LocalClear,
        ]
    );
    assert_eq!(h.remote.cart_for("alice"), Some(expected));
    assert!(h.local.raw().is_none());
    assert!(h.events.any(|e| matches!(e, SyncEvent::Merged { items: 2, .. })));
    assert_eq!(h.cart.controller().phase(), SyncPhase::Synced);
}

#[tokio::test]
async fn test_login_appends_device_only_items_after_account_items() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    let c = board("c", "w", "t", "b");
    h.local.seed(&cart_of(&[(&c, 1)])).unwrap();
    h.remote.seed("alice", cart_of(&[(&a, 2)]));

    h.become_identity(Identity::Anonymous).await;
    h.become_identity(alice()).await;

    assert_eq!(
        h.quantities(),
        vec![("a-w-t-b".to_string(), 2), ("c-w-t-b".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_login_with_empty_device_cart_does_not_write() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.remote.seed("alice", cart_of(&[(&a, 1)]));

    h.become_identity(Identity::Anonymous).await;
    h.journal.reset();
    h.become_identity(alice()).await;

    assert!(h.journal.writes().is_empty());
    assert_eq!(h.cart.total_items(), 1);
    assert!(!h.events.any(|e| matches!(e, SyncEvent::Merged { .. })));
}

#[tokio::test]
async fn test_first_resolution_as_user_merges_leftover_device_cart() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.local.seed(&cart_of(&[(&a, 1)])).unwrap();

    h.become_identity(alice()).await;

    assert_eq!(h.cart.total_items(), 1);
    assert_eq!(h.remote.cart_for("alice"), Some(cart_of(&[(&a, 1)])));
    assert!(h.local.raw().is_none());
}

// ============================================================================
// Logout and account switch
// ============================================================================

#[tokio::test]
async fn test_logout_starts_an_empty_anonymous_cart() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.remote.seed("alice", cart_of(&[(&a, 4)]));

    h.become_identity(alice()).await;
    assert_eq!(h.cart.total_items(), 4);
    h.journal.reset();

    h.become_identity(Identity::Anonymous).await;

    assert!(h.cart.items().is_empty());
    assert_eq!(h.journal.writes(), vec![StoreCall::LocalClear]);
    // The account cart is left alone
    assert_eq!(h.remote.cart_for("alice"), Some(cart_of(&[(&a, 4)])));

    h.journal.reset();
    h.cart.add_item(board("z", "w", "t", "b")).await;
    assert!(matches!(
        h.journal.writes().as_slice(),
        [StoreCall::LocalSave(_)]
    ));
}

#[tokio::test]
async fn test_switch_user_never_merges() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    let b = board("b", "w", "t", "b");
    h.remote.seed("alice", cart_of(&[(&a, 1)]));
    h.remote.seed("bob", cart_of(&[(&b, 2)]));

    h.become_identity(alice()).await;
    // Something left on the device while alice was signed in
    h.local.seed(&cart_of(&[(&a, 5)])).unwrap();
    h.journal.reset();

    h.become_identity(Identity::user("bob")).await;

    assert_eq!(&h.cart.snapshot(), &cart_of(&[(&b, 2)]));
    assert_eq!(h.journal.writes(), vec![StoreCall::LocalClear]);
    assert_eq!(h.remote.cart_for("bob"), Some(cart_of(&[(&b, 2)])));
    assert!(!h.events.any(|e| matches!(e, SyncEvent::Merged { .. })));
}

#[tokio::test]
async fn test_account_cart_survives_logout_and_login() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");

    h.become_identity(alice()).await;
    h.cart.add_item(a.clone()).await;
    h.become_identity(Identity::Anonymous).await;
    h.become_identity(alice()).await;

    assert_eq!(&h.cart.snapshot(), &cart_of(&[(&a, 1)]));
}

// ============================================================================
// Stale loads and writes
// ============================================================================

#[tokio::test]
async fn test_logout_during_in_flight_fetch_discards_result() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.remote.seed("alice", cart_of(&[(&a, 3)]));
    h.become_identity(Identity::Anonymous).await;

    let gate = FetchGate::new();
    h.remote.hold_next_fetch(Arc::clone(&gate));
    h.publisher.publish_identity(alice());

    let publisher = &h.publisher;
    tokio::join!(h.cart.sync(), async {
        gate.wait_entered().await;
        publisher.publish_identity(Identity::Anonymous);
        gate.release();
    });

    // Alice's cart never reached memory
    assert!(h.cart.items().is_empty());
    assert!(!h.cart.is_loaded());
    assert!(h.events.any(|e| matches!(
        e,
        SyncEvent::StaleLoadDiscarded { identity } if identity == &alice()
    )));

    h.cart.sync().await;
    assert!(h.cart.is_loaded());
    assert!(h.cart.items().is_empty());

    h.cart.add_item(board("z", "w", "t", "b")).await;
    let writes = h.journal.writes();
    assert!(
        writes
            .iter()
            .all(|call| !matches!(call, StoreCall::RemoteReplace(..))),
        "no write may reach alice's account: {writes:?}"
    );
    assert_eq!(h.remote.cart_for("alice"), Some(cart_of(&[(&a, 3)])));
}

#[tokio::test]
async fn test_switch_during_in_flight_fetch_loads_new_user() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    let b = board("b", "w", "t", "b");
    h.remote.seed("alice", cart_of(&[(&a, 1)]));
    h.remote.seed("bob", cart_of(&[(&b, 1)]));

    let gate = FetchGate::new();
    h.remote.hold_next_fetch(Arc::clone(&gate));
    h.publisher.publish_identity(alice());

    let publisher = &h.publisher;
    tokio::join!(h.cart.sync(), async {
        gate.wait_entered().await;
        publisher.publish_identity(Identity::user("bob"));
        gate.release();
    });
    assert!(!h.cart.is_loaded());

    h.cart.sync().await;

    assert_eq!(&h.cart.snapshot(), &cart_of(&[(&b, 1)]));
    assert_eq!(
        h.cart.controller().state().tracked_identity,
        Some(Identity::user("bob"))
    );
}

#[tokio::test]
async fn test_write_before_load_completes_is_suppressed() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.local.seed(&cart_of(&[(&a, 1)])).unwrap();

    // Identity not resolved yet: the mutation stays in memory only
    assert_eq!(
        h.cart.add_item(board("z", "w", "t", "b")).await,
        AddOutcome::Added
    );
    assert!(h.journal.writes().is_empty());
    assert!(h.events.any(|e| matches!(
        e,
        SyncEvent::StaleWriteSuppressed {
            reason: SuppressReason::LoadIncomplete
        }
    )));

    // The load is authoritative
    h.become_identity(Identity::Anonymous).await;
    assert_eq!(&h.cart.snapshot(), &cart_of(&[(&a, 1)]));
    assert_eq!(h.local.peek(), Some(cart_of(&[(&a, 1)])));
}

#[tokio::test]
async fn test_mutation_during_in_flight_fetch_stays_in_memory() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    let z = board("z", "w", "t", "b");
    h.remote.seed("alice", cart_of(&[(&a, 2)]));

    let gate = FetchGate::new();
    h.remote.hold_next_fetch(Arc::clone(&gate));
    h.publisher.publish_identity(alice());

    let cart = &h.cart;
    tokio::join!(cart.sync(), async {
        gate.wait_entered().await;
        h.journal.reset();

        // The cart stays usable while the fetch is pending
        assert!(!cart.is_loaded());
        assert_eq!(cart.add_item(z.clone()).await, AddOutcome::Added);
        assert_eq!(cart.total_items(), 1);
        assert!(h.journal.calls().is_empty());

        gate.release();
    });

    assert!(h.events.any(|e| matches!(
        e,
        SyncEvent::StaleWriteSuppressed {
            reason: SuppressReason::LoadIncomplete
        }
    )));
    // The load result wins over the in-memory edit
    assert!(h.cart.is_loaded());
    assert_eq!(&h.cart.snapshot(), &cart_of(&[(&a, 2)]));
    assert_eq!(h.remote.cart_for("alice"), Some(cart_of(&[(&a, 2)])));
    assert!(h.journal.writes().is_empty());
}

#[tokio::test]
async fn test_second_sync_during_in_flight_fetch_does_not_refetch() {
    let h = Harness::new();
    let gate = FetchGate::new();
    h.remote.hold_next_fetch(Arc::clone(&gate));
    h.publisher.publish_identity(alice());

    tokio::join!(h.cart.sync(), async {
        gate.wait_entered().await;
        h.cart.sync().await;
        gate.release();
    });

    assert!(h.cart.is_loaded());
    assert_eq!(
        h.journal.calls(),
        vec![StoreCall::RemoteFetch(user("alice")), StoreCall::LocalLoad]
    );
}

#[tokio::test]
async fn test_write_after_unprocessed_identity_change_is_suppressed() {
    let h = Harness::new();
    let b = board("b", "w", "t", "b");
    h.remote.seed("bob", cart_of(&[(&b, 1)]));
    h.become_identity(alice()).await;
    h.journal.reset();

    // Bob signed in but the controller has not processed it yet
    h.publisher.publish_identity(Identity::user("bob"));
    h.cart.add_item(board("z", "w", "t", "b")).await;
    h.cart.clear_cart().await;

    assert!(h.journal.writes().is_empty());
    assert!(h.events.any(|e| matches!(
        e,
        SyncEvent::StaleWriteSuppressed {
            reason: SuppressReason::IdentityMismatch { .. }
        }
    )));

    h.cart.sync().await;
    assert_eq!(&h.cart.snapshot(), &cart_of(&[(&b, 1)]));
    assert_eq!(h.remote.cart_for("alice"), None);
}

// ============================================================================
// Degraded stores
// ============================================================================

#[tokio::test]
async fn test_remote_outage_falls_back_to_device_cart() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.local.seed(&cart_of(&[(&a, 1)])).unwrap();
    h.remote.set_offline(true);

    h.become_identity(Identity::Anonymous).await;
    h.become_identity(alice()).await;

    assert!(h.cart.is_loaded());
    assert_eq!(&h.cart.snapshot(), &cart_of(&[(&a, 1)]));
    assert!(h.local.raw().is_some(), "device cart must not be dropped");
    assert!(h.events.any(|e| matches!(
        e,
        SyncEvent::RemoteUnavailable {
            op: RemoteOp::Fetch,
            ..
        }
    )));
}

#[tokio::test]
async fn test_edits_after_outage_stay_on_device_and_merge_later() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    let g = board("g", "w", "t", "b");
    let z = board("z", "w", "t", "b");
    h.remote.seed("alice", cart_of(&[(&a, 3)]));
    h.local.seed(&cart_of(&[(&g, 1)])).unwrap();
    h.remote.set_offline(true);

    h.become_identity(alice()).await;
    h.remote.set_offline(false);
    h.journal.reset();

    h.cart.add_item(z.clone()).await;

    // The account cart was never read, so it must not be overwritten
    assert_eq!(
        h.journal.writes(),
        vec![StoreCall::LocalSave(cart_of(&[(&g, 1), (&z, 1)]))]
    );
    assert_eq!(h.remote.cart_for("alice"), Some(cart_of(&[(&a, 3)])));

    // A later session for the same user merges the device cart in
    let journal = Journal::new();
    let local = RecordingLocalStore::new(journal.clone());
    local.seed(&h.local.peek().unwrap()).unwrap();
    let next = Harness::with_local(local, journal);
    next.remote.seed("alice", cart_of(&[(&a, 3)]));

    next.become_identity(alice()).await;

    assert_eq!(
        &next.cart.snapshot(),
        &cart_of(&[(&a, 3), (&g, 1), (&z, 1)])
    );
    assert!(next.local.raw().is_none());
}

#[tokio::test]
async fn test_failed_merge_write_keeps_device_cart() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.local.seed(&cart_of(&[(&a, 1)])).unwrap();
    h.remote.set_fail_replace(true);

    h.become_identity(alice()).await;

    assert!(h.cart.is_loaded());
    assert_eq!(h.cart.total_items(), 1);
    assert_eq!(h.local.peek(), Some(cart_of(&[(&a, 1)])));
    assert!(!h.journal.calls().contains(&StoreCall::LocalClear));
    assert!(h.events.any(|e| matches!(
        e,
        SyncEvent::LocalRetainedAfterFailedMerge { user } if user.as_str() == "alice"
    )));
}

#[tokio::test]
async fn test_corrupt_device_cart_is_treated_as_empty() {
    let journal = Journal::new();
    let local = RecordingLocalStore::with_raw(journal.clone(), "{\"items\": [");
    let h = Harness::with_local(local, journal);

    h.become_identity(Identity::Anonymous).await;

    assert!(h.cart.is_loaded());
    assert!(h.cart.items().is_empty());
    assert!(h.events.any(|e| matches!(e, SyncEvent::StorageCorrupt { .. })));

    h.cart.add_item(board("a", "w", "t", "b")).await;
    assert_eq!(
        h.local.peek().as_ref().map(CartSnapshot::total_items),
        Some(1)
    );
}

// ============================================================================
// Cart operations
// ============================================================================

#[tokio::test]
async fn test_signed_in_mutations_write_to_account() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.become_identity(alice()).await;
    h.journal.reset();

    h.cart.add_item(a.clone()).await;
    h.cart.update_quantity(&a.id, 3).await;
    h.cart.clear_cart().await;

    assert_eq!(
        h.journal.writes(),
        vec![
            StoreCall::RemoteReplace(user("alice"), cart_of(&[(&a, 1)])),
            StoreCall::RemoteReplace(user("alice"), cart_of(&[(&a, 3)])),
            StoreCall::RemoteClear(user("alice")),
        ]
    );
    assert!(h.events.any(|e| matches!(
        e,
        SyncEvent::Cleared {
            target: WriteTarget::Remote(_)
        }
    )));
    assert_eq!(h.remote.cart_for("alice"), None);
}

#[tokio::test]
async fn test_unchanged_cart_is_not_written() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.become_identity(Identity::Anonymous).await;
    h.journal.reset();

    assert!(!h.cart.remove_item(&a.id).await);
    h.cart.update_quantity(&a.id, 2).await;

    assert!(h.journal.writes().is_empty());
}

#[tokio::test]
async fn test_republishing_same_identity_does_not_reload() {
    let h = Harness::new();
    h.become_identity(alice()).await;
    h.journal.reset();

    assert!(!h.publisher.publish_identity(alice()));
    h.cart.sync().await;

    assert!(h.journal.calls().is_empty());
}

#[tokio::test]
async fn test_watch_identity_processes_changes_until_provider_drops() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    h.remote.seed("alice", cart_of(&[(&a, 1)]));

    h.publisher.publish_identity(alice());
    assert!(h.cart.watch_identity().await);
    assert_eq!(h.cart.total_items(), 1);

    let Harness {
        publisher,
        cart,
        ..
    } = h;
    drop(publisher);
    assert!(!cart.watch_identity().await);
    assert_eq!(&cart.snapshot(), &cart_of(&[(&a, 1)]));
}

#[tokio::test]
async fn test_totals_follow_quantities() {
    let h = Harness::new();
    let a = board("a", "w", "t", "b");
    let b = board("b", "w", "t", "b");
    h.become_identity(Identity::Anonymous).await;

    h.cart.add_item(a.clone()).await;
    h.cart.add_item(b.clone()).await;
    h.cart.update_quantity(&a.id, 2).await;

    assert_eq!(h.cart.total_items(), 3);
    assert_eq!(h.cart.total_price().cents(), 3 * 7999);
    assert_eq!(&h.cart.snapshot(), &cart_of(&[(&a, 2), (&b, 1)]));
}
