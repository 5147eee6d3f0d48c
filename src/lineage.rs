//! Decomposition of a track graph into a forest of lineage trees.
//!
//! Each tree is linearized into maximal non-branching runs ("tracks"). The
//! traversal is in-order: a division's first child subtree comes before the
//! dividing track and the second child subtree after it, so both children of a
//! division are the nearest track with the matching start time in either
//! direction.

use crate::error::{ErrorCode, TrackError};
use crate::track_graph::{NodeId, TrackGraph};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Square,
    Circle,
    Cross,
    TriangleUp,
}

impl Marker {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Circle => "circle",
            Self::Cross => "cross",
            Self::TriangleUp => "triangle_up",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub marker: Marker,
    pub node: NodeId,
    pub time: i64,
    pub feature: Option<f64>,
}

/// A maximal path whose interior detections have one parent and one child.
/// Never empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// The dividing detection this track descends from, `None` for a root track.
    pub parent: Option<NodeId>,
    pub vertices: Vec<Vertex>,
}

impl Track {
    pub fn first(&self) -> &Vertex {
        &self.vertices[0]
    }

    pub fn last(&self) -> &Vertex {
        &self.vertices[self.vertices.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn start_time(&self) -> i64 {
        self.first().time
    }

    pub fn end_time(&self) -> i64 {
        self.last().time
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn ends_in_division(&self) -> bool {
        self.last().marker == Marker::TriangleUp
    }

    /// Offset of the vertex at frame `time`, if the track spans it.
    pub fn offset_at(&self, time: i64) -> Option<usize> {
        if time < self.start_time() || time > self.end_time() {
            return None;
        }
        self.vertices.iter().position(|v| v.time == time)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackRef {
    pub tree: usize,
    pub track: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scan {
    Backward,
    Forward,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineageTree {
    pub root: NodeId,
    /// The in-order linearization of the tree.
    pub tracks: Vec<Track>,
}

impl LineageTree {
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.tracks
            .iter()
            .flat_map(|t| t.vertices.iter().map(|v| v.node))
    }

    fn scan(&self, from: usize, direction: Scan, matches: impl Fn(&Track) -> bool) -> Option<usize> {
        // At most tracks.len() steps in either direction.
        match direction {
            Scan::Backward => (0..from).rev().find(|idx| matches(&self.tracks[*idx])),
            Scan::Forward => (from + 1..self.tracks.len()).find(|idx| matches(&self.tracks[*idx])),
        }
    }

    /// The two child tracks of the division ending track `idx`, in successor
    /// order.
    pub fn division_children(&self, idx: usize) -> Result<(usize, usize), TrackError> {
        let Some(track) = self.tracks.get(idx) else {
            return Err(TrackError::new(
                ErrorCode::LayoutInconsistency,
                format!("Tree rooted at {} has no track {idx}", self.root),
            ));
        };
        let parent = track.last();
        if parent.marker != Marker::TriangleUp {
            return Err(TrackError::new(
                ErrorCode::LayoutInconsistency,
                format!("Track {idx} of tree {} does not end in a division", self.root),
            ));
        }
        let is_child = |t: &Track| t.start_time() == parent.time + 1 && t.parent == Some(parent.node);
        let before = self.scan(idx, Scan::Backward, &is_child);
        let after = self.scan(idx, Scan::Forward, &is_child);
        match (before, after) {
            (Some(before), Some(after)) => Ok((before, after)),
            _ => Err(TrackError::new(
                ErrorCode::LayoutInconsistency,
                format!(
                    "Could not find both child tracks of division {} at time {}",
                    parent.node, parent.time
                ),
            )),
        }
    }

    /// The track ending in the division that track `idx` descends from,
    /// searched nearest-first in both directions.
    pub fn division_parent(&self, idx: usize) -> Option<usize> {
        let track = self.tracks.get(idx)?;
        let parent = track.parent?;
        let start = track.start_time();
        let is_parent = |t: &Track| t.end_time() == start - 1 && t.last().node == parent;
        for distance in 1..self.tracks.len() {
            if let Some(before) = idx.checked_sub(distance) {
                if is_parent(&self.tracks[before]) {
                    return Some(before);
                }
            }
            let after = idx + distance;
            if after < self.tracks.len() && is_parent(&self.tracks[after]) {
                return Some(after);
            }
        }
        None
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Forest {
    pub trees: Vec<LineageTree>,
    index: HashMap<NodeId, (TrackRef, usize)>,
}

impl Forest {
    fn new(trees: Vec<LineageTree>) -> Self {
        let mut index = HashMap::new();
        for (tree_idx, tree) in trees.iter().enumerate() {
            for (track_idx, track) in tree.tracks.iter().enumerate() {
                for (offset, vertex) in track.vertices.iter().enumerate() {
                    let track_ref = TrackRef {
                        tree: tree_idx,
                        track: track_idx,
                    };
                    index.insert(vertex.node, (track_ref, offset));
                }
            }
        }
        Self { trees, index }
    }

    pub fn track(&self, track_ref: TrackRef) -> Option<&Track> {
        self.trees.get(track_ref.tree)?.tracks.get(track_ref.track)
    }

    pub fn vertex(&self, track_ref: TrackRef, offset: usize) -> Option<&Vertex> {
        self.track(track_ref)?.vertices.get(offset)
    }

    /// Track and offset holding `node`.
    pub fn locate(&self, node: NodeId) -> Option<(TrackRef, usize)> {
        self.index.get(&node).copied()
    }

    pub fn track_count(&self) -> usize {
        self.trees.iter().map(|t| t.tracks.len()).sum()
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Indices of the trees holding at least one of `nodes`, ascending.
    pub fn trees_containing(&self, nodes: &HashSet<NodeId>) -> Vec<usize> {
        nodes
            .iter()
            .filter_map(|n| self.locate(*n))
            .map(|(r, _)| r.tree)
            .unique()
            .sorted_unstable()
            .collect()
    }
}

pub struct LineageDecomposer<'a> {
    graph: &'a TrackGraph,
    feature_key: Option<&'a str>,
    emitted: usize,
}

impl<'a> LineageDecomposer<'a> {
    /// `feature_key` names the scalar attribute copied onto each vertex.
    pub fn new(graph: &'a TrackGraph, feature_key: Option<&'a str>) -> Self {
        Self {
            graph,
            feature_key,
            emitted: 0,
        }
    }

    pub fn decompose(mut self) -> Result<Forest, TrackError> {
        let mut trees = vec![];
        for root in self.graph.roots() {
            let tracks = self.walk(root, None, vec![])?;
            trees.push(LineageTree { root, tracks });
        }
        if self.emitted != self.graph.len() {
            return Err(TrackError::new(
                ErrorCode::TopologyViolation,
                format!(
                    "{} of {} nodes are not reachable from a root exactly once",
                    self.graph.len().abs_diff(self.emitted),
                    self.graph.len()
                ),
            ));
        }
        let forest = Forest::new(trees);
        debug!(
            trees = forest.trees.len(),
            tracks = forest.track_count(),
            nodes = forest.node_count(),
            "decomposed lineages"
        );
        Ok(forest)
    }

    fn vertex(&mut self, marker: Marker, node: NodeId) -> Result<Vertex, TrackError> {
        self.emitted += 1;
        if self.emitted > self.graph.len() {
            return Err(TrackError::new(
                ErrorCode::TopologyViolation,
                format!("Node {node} is reached more than once; the graph has a cycle or merge"),
            ));
        }
        let feature = match self.feature_key {
            Some(key) => self.graph.scalar_attr(node, key)?,
            None => None,
        };
        Ok(Vertex {
            marker,
            node,
            time: self.graph.time(node)?,
            feature,
        })
    }

    fn walk(
        &mut self,
        start: NodeId,
        parent: Option<NodeId>,
        acc: Vec<Track>,
    ) -> Result<Vec<Track>, TrackError> {
        let start_marker = if parent.is_none() {
            Marker::Square
        } else {
            Marker::Circle
        };
        let mut node = start;
        let mut vertices = vec![self.vertex(start_marker, node)?];
        let mut successors = self.graph.successors(node)?;
        while let [next] = successors[..] {
            node = next;
            vertices.push(self.vertex(Marker::Circle, node)?);
            successors = self.graph.successors(node)?;
        }
        let mut track = Track { parent, vertices };
        let last = track.vertices.len() - 1;
        match successors[..] {
            [] => {
                track.vertices[last].marker = Marker::Cross;
                let mut acc = acc;
                acc.push(track);
                Ok(acc)
            }
            [first, second] => {
                let mut acc = self.walk(first, Some(node), acc)?;
                track.vertices[last].marker = Marker::TriangleUp;
                acc.push(track);
                self.walk(second, Some(node), acc)
            }
            _ => Err(TrackError::new(
                ErrorCode::TopologyViolation,
                format!(
                    "Node {node} has {} successors, at most two are supported",
                    successors.len()
                ),
            )),
        }
    }
}

/// Convenience wrapper around `LineageDecomposer`.
pub fn decompose(graph: &TrackGraph, feature_key: Option<&str>) -> Result<Forest, TrackError> {
    LineageDecomposer::new(graph, feature_key).decompose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track_graph::tests::graph_from;

    fn markers(track: &Track) -> Vec<(Marker, NodeId)> {
        track.vertices.iter().map(|v| (v.marker, v.node)).collect()
    }

    #[test]
    fn test_single_chain() {
        let graph = graph_from(&[(1, 0, None), (2, 1, Some(1)), (3, 2, Some(2))]);
        let forest = decompose(&graph, None).unwrap();
        assert_eq!(forest.trees.len(), 1);
        assert_eq!(forest.trees[0].tracks.len(), 1);
        assert_eq!(
            markers(&forest.trees[0].tracks[0]),
            vec![
                (Marker::Square, 1),
                (Marker::Circle, 2),
                (Marker::Cross, 3)
            ]
        );
    }

    #[test]
    fn test_division_is_in_order() {
        let graph = graph_from(&[(1, 0, None), (2, 1, Some(1)), (3, 1, Some(1))]);
        let forest = decompose(&graph, Some("area")).unwrap();
        let tracks = &forest.trees[0].tracks;
        assert_eq!(tracks.len(), 3);
        assert_eq!(markers(&tracks[0]), vec![(Marker::Cross, 2)]);
        assert_eq!(markers(&tracks[1]), vec![(Marker::TriangleUp, 1)]);
        assert_eq!(markers(&tracks[2]), vec![(Marker::Cross, 3)]);
        assert_eq!(tracks[0].parent, Some(1));
        assert!(tracks[1].is_root());
        assert_eq!(tracks[2].first().feature, Some(30.0));
        assert_eq!(forest.trees[0].division_children(1).unwrap(), (0, 2));
        assert_eq!(forest.trees[0].division_parent(0), Some(1));
        assert_eq!(forest.trees[0].division_parent(2), Some(1));
        assert_eq!(forest.trees[0].division_parent(1), None);
    }

    #[test]
    fn test_nested_divisions() {
        // 1 -> 2 -> {3 -> {5, 6}, 4}
        let graph = graph_from(&[
            (1, 0, None),
            (2, 1, Some(1)),
            (3, 2, Some(2)),
            (4, 2, Some(2)),
            (5, 3, Some(3)),
            (6, 3, Some(3)),
            (7, 0, None),
        ]);
        let forest = decompose(&graph, None).unwrap();
        assert_eq!(forest.trees.len(), 2);
        let tree = &forest.trees[0];
        let firsts = tree.tracks.iter().map(|t| t.first().node).collect::<Vec<_>>();
        assert_eq!(firsts, vec![5, 3, 6, 1, 4]);
        assert_eq!(tree.division_children(3).unwrap(), (1, 4));
        assert_eq!(tree.division_children(1).unwrap(), (0, 2));
        assert_eq!(tree.division_parent(4), Some(3));
        assert_eq!(tree.division_parent(2), Some(1));
        assert_eq!(forest.locate(6).unwrap(), (TrackRef { tree: 0, track: 2 }, 0));
        assert_eq!(forest.locate(7).unwrap(), (TrackRef { tree: 1, track: 0 }, 0));
        assert_eq!(forest.track_count(), 6);
    }

    #[test]
    fn test_three_successors_rejected() {
        let graph = graph_from(&[(1, 0, None), (2, 1, Some(1)), (3, 1, Some(1)), (4, 1, Some(1))]);
        let err = decompose(&graph, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::TopologyViolation);
    }

    #[test]
    fn test_merge_rejected() {
        let mut graph = graph_from(&[(1, 0, None), (2, 0, None), (3, 1, Some(1))]);
        graph.add_edge(2, 3).unwrap();
        let err = decompose(&graph, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::TopologyViolation);
    }

    #[test]
    fn test_division_children_requires_division() {
        let graph = graph_from(&[(1, 0, None), (2, 1, Some(1))]);
        let forest = decompose(&graph, None).unwrap();
        let err = forest.trees[0].division_children(0).unwrap_err();
        assert_eq!(err.code, ErrorCode::LayoutInconsistency);
    }

    #[test]
    fn test_division_with_skipped_frame() {
        // 3 is recorded as a child of 1 but starts two frames later.
        let graph = graph_from(&[(1, 0, None), (2, 1, Some(1)), (3, 2, Some(1))]);
        let forest = decompose(&graph, None).unwrap();
        let tree = &forest.trees[0];
        assert_eq!(tree.tracks[1].last().marker, Marker::TriangleUp);
        let err = tree.division_children(1).unwrap_err();
        assert_eq!(err.code, ErrorCode::LayoutInconsistency);
        assert_eq!(tree.division_parent(0), Some(1));
        assert_eq!(tree.division_parent(2), None);
    }

    #[test]
    fn test_offset_at() {
        let graph = graph_from(&[(1, 4, None), (2, 5, Some(1)), (3, 6, Some(2))]);
        let forest = decompose(&graph, None).unwrap();
        let track = &forest.trees[0].tracks[0];
        assert_eq!(track.offset_at(5), Some(1));
        assert_eq!(track.offset_at(7), None);
    }
}
