//! Property-based tests for tree structural invariants
//!
//! Traces are drawn from a few well-separated levels so every genuine
//! difference clears the static threshold; rejected insertions (duplicates or
//! inconclusive matches) are skipped, since those surface as explicit errors.

use bifurcar::config::DetectorConfig;
use bifurcar::tree::TraceTree;
use proptest::prelude::*;

fn level_trace() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(prop::sample::select(vec![0.0f32, 1.0, 2.0]), 2..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_every_node_has_zero_or_two_children(
        traces in prop::collection::vec(level_trace(), 1..12),
    ) {
        let mut tree = TraceTree::with_config(DetectorConfig {
            consecutive_points: 1,
            ..Default::default()
        }).unwrap();

        for (i, trace) in traces.iter().enumerate() {
            let _ = tree.insert(trace, Some(&i.to_string()));
        }

        for node in 0..tree.len() {
            let children =
                tree.left(node).is_some() as usize + tree.right(node).is_some() as usize;
            prop_assert!(children == 0 || children == 2);
        }
    }

    #[test]
    fn prop_leaves_reconstruct_their_inserted_traces(
        traces in prop::collection::vec(level_trace(), 1..12),
    ) {
        let mut tree = TraceTree::with_config(DetectorConfig {
            consecutive_points: 1,
            ..Default::default()
        }).unwrap();

        let mut accepted = 0usize;
        for (i, trace) in traces.iter().enumerate() {
            if tree.insert(trace, Some(&i.to_string())).is_ok() {
                accepted += 1;
            }
        }

        // One leaf per successfully inserted pair.
        prop_assert_eq!(tree.leaf_count(), accepted);
        if accepted > 0 {
            prop_assert_eq!(tree.len(), 2 * accepted - 1);
        }

        // Segment values are drawn from exactly-representable levels, so a
        // matched prefix is sample-for-sample identical and reconstruction
        // is exact.
        for leaf in tree.leaves() {
            let index: usize = tree.input(leaf).unwrap().parse().unwrap();
            prop_assert_eq!(tree.reconstruct(leaf), traces[index].clone());
        }
    }

    #[test]
    fn prop_parent_links_are_consistent(
        traces in prop::collection::vec(level_trace(), 1..12),
    ) {
        let mut tree = TraceTree::with_config(DetectorConfig {
            consecutive_points: 1,
            ..Default::default()
        }).unwrap();

        for (i, trace) in traces.iter().enumerate() {
            let _ = tree.insert(trace, Some(&i.to_string()));
        }

        for node in 0..tree.len() {
            for child in [tree.left(node), tree.right(node)].into_iter().flatten() {
                prop_assert_eq!(tree.parent(child), Some(node));
            }
            match tree.parent(node) {
                None => prop_assert_eq!(tree.root(), Some(node)),
                Some(parent) => prop_assert!(
                    tree.left(parent) == Some(node) || tree.right(parent) == Some(node)
                ),
            }
        }
    }

    #[test]
    fn prop_detector_never_panics_on_arbitrary_finite_traces(
        a in prop::collection::vec(-100.0f32..100.0, 0..64),
        b in prop::collection::vec(-100.0f32..100.0, 0..64),
        mv_window in 1usize..6,
        consecutive_points in 1usize..5,
    ) {
        use bifurcar::detector::DivergenceDetector;

        let mut detector = DivergenceDetector::new(DetectorConfig {
            mv_window,
            consecutive_points,
            ..Default::default()
        })
        .unwrap();

        let outcome = detector.find_divergence(&a, &b);
        if let Some(index) = outcome {
            prop_assert!(index < a.len().min(b.len()));
        }
        // The static default is 0.05 and adaptation floors at 0.04.
        prop_assert!(detector.current_threshold() >= 0.04);
    }
}
