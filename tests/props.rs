use clipprep::frame::{FramePolicy, frame_starts};
use clipprep::split::{random_split, read_split_files, val_count, write_split_files};
use proptest::prelude::*;
use std::collections::BTreeSet;

proptest! {
    #[test]
    fn split_partitions_input(
        ids in prop::collection::btree_set("[a-z0-9]{1,8}", 0..200),
        ratio in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let ids: Vec<String> = ids.into_iter().collect();
        let a = random_split(&ids, ratio, seed).unwrap();

        let train: BTreeSet<&str> = a.train().into_iter().collect();
        let val: BTreeSet<&str> = a.val().into_iter().collect();
        prop_assert!(train.is_disjoint(&val));
        prop_assert_eq!(train.len() + val.len(), ids.len());
        prop_assert_eq!(val.len(), val_count(ids.len(), ratio));
        for id in &ids {
            prop_assert!(a.partition_of(id).is_some());
        }
    }

    #[test]
    fn split_is_deterministic_and_order_free(
        ids in prop::collection::btree_set("[a-z]{1,6}", 1..100),
        seed in any::<u64>(),
    ) {
        let forward: Vec<String> = ids.iter().cloned().collect();
        let backward: Vec<String> = ids.iter().rev().cloned().collect();
        let a = random_split(&forward, 0.3, seed).unwrap();
        prop_assert_eq!(&a, &random_split(&forward, 0.3, seed).unwrap());
        prop_assert_eq!(&a, &random_split(&backward, 0.3, seed).unwrap());
    }

    #[test]
    fn manifest_reload_is_identical(
        n in 0usize..40,
        ratio in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let ids: Vec<String> = (0..n).map(|i| format!("clip{i}")).collect();
        let a = random_split(&ids, ratio, seed).unwrap();
        let dir = tempfile::tempdir().unwrap();
        write_split_files(&a, dir.path()).unwrap();
        let back = read_split_files(dir.path()).unwrap();
        prop_assert_eq!(back.params().map(|p| p.ratio.to_bits()), Some(ratio.to_bits()));
        prop_assert_eq!(back, a);
    }

    #[test]
    fn frame_count_formulas(len in 0usize..500, fl in 1usize..64, hop in 1usize..64) {
        let drop = frame_starts(len, fl, hop, FramePolicy::Drop).unwrap();
        let pad = frame_starts(len, fl, hop, FramePolicy::Pad).unwrap();
        // Every dropped-policy frame fits; padding covers the whole input.
        prop_assert!(drop.iter().all(|&s| s + fl <= len));
        prop_assert!(pad.len() >= drop.len());
        if len > 0 {
            let last = *pad.last().unwrap();
            prop_assert!(last < len);
            if hop <= fl {
                prop_assert!(last + fl >= len);
            }
        } else {
            prop_assert!(pad.is_empty());
        }
    }
}
