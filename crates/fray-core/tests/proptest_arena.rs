//! Property tests for the volume arena.
//!
//! Random insert/remove sequences must never let a stale handle observe a
//! newer value, and the live count must track a reference model.

use std::collections::BTreeMap;

use fray_core::arena::{VolumeArena, VolumeId};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum ArenaOp {
    Insert(u32),
    Remove(usize),
}

fn arena_op_strategy() -> impl Strategy<Value = ArenaOp> {
    prop_oneof![
        any::<u32>().prop_map(ArenaOp::Insert),
        (0..64usize).prop_map(ArenaOp::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn arena_matches_model(ops in prop::collection::vec(arena_op_strategy(), 1..200)) {
        let mut arena = VolumeArena::with_capacity(64);
        let mut model: BTreeMap<VolumeId, u32> = BTreeMap::new();
        let mut issued: Vec<VolumeId> = Vec::new();

        for op in ops {
            match op {
                ArenaOp::Insert(v) => {
                    if arena.len() < arena.capacity() {
                        let id = arena.insert(v);
                        prop_assert!(!model.contains_key(&id), "fresh id must be unused");
                        model.insert(id, v);
                        issued.push(id);
                    }
                }
                ArenaOp::Remove(i) => {
                    if !issued.is_empty() {
                        let id = issued[i % issued.len()];
                        prop_assert_eq!(arena.remove(id), model.remove(&id));
                    }
                }
            }

            prop_assert_eq!(arena.len(), model.len());
            for id in &issued {
                prop_assert_eq!(arena.get(*id), model.get(id));
            }
        }
    }
}
