//! Property-based tests for the room store.
//!
//! Verify invariants that must hold for all input sequences: append order,
//! id uniqueness, export filtering, and that failed reply lookups are
//! side-effect free.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use backchannel_proto::MessageKind;
use backchannel_server::{Environment, RoomStore};
use proptest::prelude::*;

/// Deterministic stepping clock.
#[derive(Clone)]
struct TestEnv {
    millis: Arc<AtomicU64>,
}

impl TestEnv {
    fn starting_at(millis: u64) -> Self {
        Self { millis: Arc::new(AtomicU64::new(millis)) }
    }
}

impl Environment for TestEnv {
    fn now_millis(&self) -> u64 {
        self.millis.fetch_add(1, Ordering::Relaxed)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0x5a);
    }
}

fn arb_kind() -> impl Strategy<Value = MessageKind> {
    prop_oneof![
        Just(MessageKind::Reaction),
        Just(MessageKind::Question),
        Just(MessageKind::Comment),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: snapshot returns appends in exact call order with unique ids.
    #[test]
    fn prop_snapshot_preserves_append_order(
        start in 1_000_000_u64..2_000_000,
        bodies in prop::collection::vec(".{0,40}", 1..30),
    ) {
        let env = TestEnv::starting_at(start);
        let mut store = RoomStore::new();

        let mut appended = Vec::new();
        for body in &bodies {
            appended.push(store.append_message("R1", MessageKind::Comment, body, &env));
        }

        let snapshot = store.snapshot("R1");
        prop_assert_eq!(&snapshot, &appended);

        let ids: HashSet<_> = snapshot.iter().map(|m| m.id.clone()).collect();
        prop_assert_eq!(ids.len(), snapshot.len());
    }

    /// Property: export never contains an excluded kind and its length equals
    /// the count of non-excluded appends.
    #[test]
    fn prop_export_filters_exactly_the_excluded_kind(
        start in 1_000_000_u64..2_000_000,
        kinds in prop::collection::vec(arb_kind(), 0..50),
    ) {
        let env = TestEnv::starting_at(start);
        let mut store = RoomStore::new();

        for (i, kind) in kinds.iter().enumerate() {
            store.append_message("R1", *kind, &format!("m{i}"), &env);
        }

        let export = store.export_transcript("R1", &[MessageKind::Reaction], &env);

        let expected = kinds.iter().filter(|k| **k != MessageKind::Reaction).count();
        prop_assert_eq!(export.messages.len(), expected);
        prop_assert!(export.messages.iter().all(|m| m.kind != MessageKind::Reaction));
    }

    /// Property: replying to an id that was never minted leaves every room's
    /// log unchanged.
    #[test]
    fn prop_missing_reply_target_has_no_side_effect(
        start in 1_000_000_u64..2_000_000,
        kinds in prop::collection::vec(arb_kind(), 0..20),
        bogus_id in "[a-z0-9-]{1,20}",
    ) {
        let env = TestEnv::starting_at(start);
        let mut store = RoomStore::new();

        for (i, kind) in kinds.iter().enumerate() {
            store.append_message("R1", *kind, &format!("m{i}"), &env);
        }

        // Minted ids always contain the start timestamp prefix; a short
        // alphanumeric token can only collide if it matches one exactly.
        prop_assume!(store.snapshot("R1").iter().all(|m| m.id != bogus_id));

        let before = store.snapshot("R1");
        prop_assert!(store.append_reply("R1", &bogus_id, "x", &env).is_none());
        prop_assert_eq!(store.snapshot("R1"), before);
    }

    /// Property: reply order matches call order and each reply grows the
    /// thread by exactly one.
    #[test]
    fn prop_reply_thread_grows_in_call_order(
        start in 1_000_000_u64..2_000_000,
        replies in prop::collection::vec(".{0,20}", 1..15),
    ) {
        let env = TestEnv::starting_at(start);
        let mut store = RoomStore::new();

        let msg = store.append_message("R1", MessageKind::Question, "q", &env);

        for (i, body) in replies.iter().enumerate() {
            let updated = store.append_reply("R1", &msg.id, body, &env);
            let updated = updated.expect("target exists");
            prop_assert_eq!(updated.replies.len(), i + 1);
        }

        let stored = &store.snapshot("R1")[0];
        let bodies: Vec<_> = stored.replies.iter().map(|r| r.body.clone()).collect();
        prop_assert_eq!(bodies, replies);
    }

    /// Property: logs in different rooms never interfere.
    #[test]
    fn prop_rooms_are_isolated(
        start in 1_000_000_u64..2_000_000,
        per_room in prop::collection::vec((0_usize..5, arb_kind()), 1..30),
    ) {
        let env = TestEnv::starting_at(start);
        let mut store = RoomStore::new();

        let mut expected_counts = [0_usize; 5];
        for (room, kind) in &per_room {
            store.append_message(&format!("room-{room}"), *kind, "body", &env);
            expected_counts[*room] += 1;
        }

        for (room, expected) in expected_counts.iter().enumerate() {
            prop_assert_eq!(store.message_count(&format!("room-{room}")), *expected);
        }
    }
}
