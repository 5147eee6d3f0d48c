//! Property tests over randomly grown lineage forests.
//!
//! Forests are grown one detection at a time: each new detection either starts
//! a new lineage or attaches to an existing detection with fewer than two
//! children, one frame after it. Areas are `10 * id`, so feature values never
//! tie.

use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use treeview::lineage::{Marker, decompose};
use treeview::node_attr::AttrValue;
use treeview::selection::Modifiers;
use treeview::settings::ViewSettings;
use treeview::{NavigationEngine, NodeId, TrackGraph};

fn grow_graph(steps: &[(bool, Index)]) -> TrackGraph {
    let mut graph = TrackGraph::new(Some(3));
    let mut times: Vec<i64> = vec![];
    let mut children: Vec<usize> = vec![];
    for (idx, (attach, pick)) in steps.iter().enumerate() {
        let id = idx as NodeId;
        let open = (0..idx).filter(|n| children[*n] < 2).collect::<Vec<_>>();
        let parent = (*attach && !open.is_empty()).then(|| open[pick.index(open.len())]);
        let time = parent.map(|p| times[p] + 1).unwrap_or(0);
        let mut attrs = BTreeMap::new();
        attrs.insert("area".to_string(), AttrValue::Number(id as f64 * 10.0));
        graph
            .add_node(id, vec![time as f64, 0.0, 0.0], attrs)
            .unwrap();
        if let Some(p) = parent {
            graph.add_edge(p as NodeId, id).unwrap();
            children[p] += 1;
        }
        times.push(time);
        children.push(0);
    }
    graph
}

fn steps() -> impl Strategy<Value = Vec<(bool, Index)>> {
    prop::collection::vec((prop::bool::weighted(0.85), any::<Index>()), 1..60)
}

proptest! {
    #[test]
    fn every_node_lands_in_exactly_one_track(steps in steps()) {
        let graph = grow_graph(&steps);
        let forest = decompose(&graph, None).unwrap();
        let mut seen = forest
            .trees
            .iter()
            .flat_map(|t| t.node_ids())
            .collect::<Vec<_>>();
        seen.sort_unstable();
        let mut expected = graph.nodes();
        expected.sort_unstable();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn track_ends_match_out_degree(steps in steps()) {
        let graph = grow_graph(&steps);
        let forest = decompose(&graph, None).unwrap();
        for tree in &forest.trees {
            for track in &tree.tracks {
                let last = track.last();
                let out = graph.out_degree(Some(&[last.node])).unwrap()[0];
                match out {
                    0 => {
                        prop_assert_eq!(last.marker, Marker::Cross);
                    }
                    2 => {
                        prop_assert_eq!(last.marker, Marker::TriangleUp);
                        let children = tree
                            .tracks
                            .iter()
                            .filter(|t| t.start_time() == last.time + 1 && t.parent == Some(last.node))
                            .count();
                        prop_assert_eq!(children, 2);
                    }
                    _ => {
                        prop_assert!(false, "track ends at node {} with out-degree {}", last.node, out);
                    }
                }
            }
        }
    }

    #[test]
    fn lanes_are_contiguous(steps in steps()) {
        let graph = grow_graph(&steps);
        let engine = NavigationEngine::new(Arc::new(graph), ViewSettings::default()).unwrap();
        let lanes = engine.layout().tracks.iter().map(|t| t.lane).collect::<Vec<_>>();
        prop_assert_eq!(lanes, (0..engine.forest().track_count()).collect::<Vec<_>>());
        let unique = engine
            .layout()
            .tracks
            .iter()
            .map(|t| t.track_ref)
            .collect::<HashSet<_>>();
        prop_assert_eq!(unique.len(), engine.layout().lane_count());
    }

    #[test]
    fn next_then_prev_cell_round_trips(steps in steps(), start in any::<Index>()) {
        let graph = grow_graph(&steps);
        let node = start.index(graph.len()) as NodeId;
        let mut engine = NavigationEngine::new(Arc::new(graph), ViewSettings::default()).unwrap();
        engine.select_node(node, Modifiers::default()).unwrap();
        if engine.select_next_cell() {
            prop_assert!(engine.select_prev_cell());
            prop_assert_eq!(engine.current_node(), Some(node));
        }
    }

    #[test]
    fn next_then_prev_feature_round_trips(steps in steps(), start in any::<Index>()) {
        let graph = grow_graph(&steps);
        let node = start.index(graph.len()) as NodeId;
        let mut engine = NavigationEngine::new(Arc::new(graph), ViewSettings::default()).unwrap();
        engine.select_node(node, Modifiers::default()).unwrap();
        if engine.select_next_feature() {
            prop_assert!(engine.select_prev_feature());
            prop_assert_eq!(engine.current_node(), Some(node));
        }
    }
}
