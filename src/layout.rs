//! Lane assignment and renderable vertex records for a decomposed forest.

use crate::error::{ErrorCode, TrackError};
use crate::lineage::{Forest, Marker, TrackRef};
use crate::settings::{Feature, ViewMode, ViewSettings};
use crate::track_graph::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The three marker groups a track is rendered as. A pick reports the group
/// and the vertex index inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPart {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedVertex {
    pub marker: Marker,
    pub node: NodeId,
    pub time: i64,
    pub feature: Option<f64>,
    /// `[lane * spacing, feature axis]`, before orientation is applied.
    pub position: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedTrack {
    pub track_ref: TrackRef,
    pub lane: usize,
    pub vertices: Vec<PlacedVertex>,
}

impl PlacedTrack {
    /// Vertex offset for a pick inside one of the rendered groups.
    pub fn resolve(&self, part: TrackPart, index: usize) -> Option<usize> {
        let len = self.vertices.len();
        match part {
            TrackPart::Start => (index == 0).then_some(0),
            TrackPart::End => (index == 0).then_some(len - 1),
            TrackPart::Middle => {
                let offset = index + 1;
                (offset + 1 < len).then_some(offset)
            }
        }
    }

    /// Rendered group and in-group index of `offset`.
    pub fn part_of(&self, offset: usize) -> (TrackPart, usize) {
        if offset == 0 {
            (TrackPart::Start, 0)
        } else if offset + 1 >= self.vertices.len() {
            (TrackPart::End, 0)
        } else {
            (TrackPart::Middle, offset - 1)
        }
    }

    pub fn offset_at(&self, time: i64) -> Option<usize> {
        self.vertices.iter().position(|v| v.time == time)
    }
}

/// Three-point line from the first child's start through the dividing
/// detection to the second child's start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivisionConnector {
    pub parent: TrackRef,
    pub children: [TrackRef; 2],
    pub points: [[f64; 2]; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub mode: ViewMode,
    pub feature: Feature,
    pub lane_spacing: f64,
    /// Visible tracks indexed by lane.
    pub tracks: Vec<PlacedTrack>,
    pub connectors: Vec<DivisionConnector>,
    #[serde(skip)]
    lanes: HashMap<TrackRef, usize>,
}

impl Layout {
    /// Assigns lanes `0..k` to the visible tracks in forest order. In lineage
    /// mode only trees holding a node of `selected` are visible.
    pub fn assign(
        forest: &Forest,
        settings: &ViewSettings,
        selected: &HashSet<NodeId>,
    ) -> Result<Self, TrackError> {
        let visible_trees: Vec<usize> = match settings.mode {
            ViewMode::All => (0..forest.trees.len()).collect(),
            ViewMode::Lineage => forest.trees_containing(selected),
        };

        let mut tracks = vec![];
        let mut lanes = HashMap::new();
        for tree_idx in &visible_trees {
            let tree = &forest.trees[*tree_idx];
            for (track_idx, track) in tree.tracks.iter().enumerate() {
                let lane = tracks.len();
                let track_ref = TrackRef {
                    tree: *tree_idx,
                    track: track_idx,
                };
                let x = lane as f64 * settings.lane_spacing;
                let vertices = track
                    .vertices
                    .iter()
                    .map(|v| -> Result<PlacedVertex, TrackError> {
                        let y = match settings.feature {
                            Feature::Tree => -(v.time as f64),
                            Feature::Attribute => v.feature.ok_or_else(|| {
                                TrackError::missing_attribute(
                                    format!("node {}", v.node),
                                    &settings.feature_key,
                                )
                            })?,
                        };
                        Ok(PlacedVertex {
                            marker: v.marker,
                            node: v.node,
                            time: v.time,
                            feature: v.feature,
                            position: [x, y],
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                lanes.insert(track_ref, lane);
                tracks.push(PlacedTrack {
                    track_ref,
                    lane,
                    vertices,
                });
            }
        }

        let mut layout = Self {
            mode: settings.mode,
            feature: settings.feature,
            lane_spacing: settings.lane_spacing,
            tracks,
            connectors: vec![],
            lanes,
        };
        layout.connectors = layout.division_connectors(forest, &visible_trees)?;
        debug!(
            mode = ?layout.mode,
            feature = ?layout.feature,
            trees = visible_trees.len(),
            lanes = layout.tracks.len(),
            connectors = layout.connectors.len(),
            "assigned lanes"
        );
        Ok(layout)
    }

    fn division_connectors(
        &self,
        forest: &Forest,
        visible_trees: &[usize],
    ) -> Result<Vec<DivisionConnector>, TrackError> {
        let mut connectors = vec![];
        for tree_idx in visible_trees {
            let tree = &forest.trees[*tree_idx];
            for (track_idx, track) in tree.tracks.iter().enumerate() {
                if !track.ends_in_division() {
                    continue;
                }
                let (first, second) = tree.division_children(track_idx)?;
                let parent = TrackRef {
                    tree: *tree_idx,
                    track: track_idx,
                };
                let children = [
                    TrackRef {
                        tree: *tree_idx,
                        track: first,
                    },
                    TrackRef {
                        tree: *tree_idx,
                        track: second,
                    },
                ];
                let points = [
                    self.start_position(children[0])?,
                    self.end_position(parent)?,
                    self.start_position(children[1])?,
                ];
                connectors.push(DivisionConnector {
                    parent,
                    children,
                    points,
                });
            }
        }
        Ok(connectors)
    }

    fn placed(&self, track_ref: TrackRef) -> Result<&PlacedTrack, TrackError> {
        self.track(track_ref).ok_or_else(|| {
            TrackError::new(
                ErrorCode::LayoutInconsistency,
                format!("Track {track_ref:?} has no lane"),
            )
        })
    }

    fn start_position(&self, track_ref: TrackRef) -> Result<[f64; 2], TrackError> {
        Ok(self.placed(track_ref)?.vertices[0].position)
    }

    fn end_position(&self, track_ref: TrackRef) -> Result<[f64; 2], TrackError> {
        let placed = self.placed(track_ref)?;
        Ok(placed.vertices[placed.vertices.len() - 1].position)
    }

    pub fn lane_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn lane_of(&self, track_ref: TrackRef) -> Option<usize> {
        self.lanes.get(&track_ref).copied()
    }

    pub fn is_visible(&self, track_ref: TrackRef) -> bool {
        self.lanes.contains_key(&track_ref)
    }

    pub fn track(&self, track_ref: TrackRef) -> Option<&PlacedTrack> {
        self.tracks.get(self.lane_of(track_ref)?)
    }

    pub fn vertex(&self, track_ref: TrackRef, offset: usize) -> Option<&PlacedVertex> {
        self.track(track_ref)?.vertices.get(offset)
    }

    /// Vertices of every visible track at frame `time`, in lane order.
    pub fn vertices_at(&self, time: i64) -> impl Iterator<Item = (TrackRef, usize, &PlacedVertex)> + '_ {
        self.tracks.iter().filter_map(move |t| {
            let offset = t.offset_at(time)?;
            Some((t.track_ref, offset, &t.vertices[offset]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::decompose;
    use crate::track_graph::tests::graph_from;
    use crate::tracks_from_table::tracks_from_csv_reader;

    fn division_forest() -> Forest {
        // 1 divides into 2 and 3; 4 is a separate single-cell lineage.
        let graph = graph_from(&[(1, 0, None), (2, 1, Some(1)), (3, 1, Some(1)), (4, 0, None)]);
        decompose(&graph, Some("area")).unwrap()
    }

    #[test]
    fn test_lanes_follow_linearization() {
        let forest = division_forest();
        let layout = Layout::assign(&forest, &ViewSettings::default(), &HashSet::new()).unwrap();
        let lanes = layout.tracks.iter().map(|t| t.lane).collect::<Vec<_>>();
        assert_eq!(lanes, vec![0, 1, 2, 3]);
        let firsts = layout
            .tracks
            .iter()
            .map(|t| t.vertices[0].node)
            .collect::<Vec<_>>();
        assert_eq!(firsts, vec![2, 1, 3, 4]);
        assert_eq!(layout.tracks[2].vertices[0].position, [20.0, -1.0]);
    }

    #[test]
    fn test_division_child_off_by_a_frame() {
        let graph = tracks_from_csv_reader(
            "id,time,y,x,parent_id\n\
             1,0,0,0,\n\
             2,1,0,0,1\n\
             3,2,0,0,1\n"
                .as_bytes(),
        )
        .unwrap();
        let forest = decompose(&graph, None).unwrap();
        let err = Layout::assign(&forest, &ViewSettings::default(), &HashSet::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::LayoutInconsistency);
        assert!(err.message.contains("division 1"));
    }

    #[test]
    fn test_serialized_lanes_match_lookup() {
        let forest = division_forest();
        let layout = Layout::assign(&forest, &ViewSettings::default(), &HashSet::new()).unwrap();
        let json = serde_json::to_value(&layout).unwrap();
        assert!(json.get("lanes").is_none());
        for (idx, track) in json["tracks"].as_array().unwrap().iter().enumerate() {
            let track_ref: TrackRef = serde_json::from_value(track["track_ref"].clone()).unwrap();
            assert_eq!(track["lane"], idx);
            assert_eq!(layout.lane_of(track_ref), Some(idx));
        }
    }

    #[test]
    fn test_division_connector() {
        let forest = division_forest();
        let layout = Layout::assign(&forest, &ViewSettings::default(), &HashSet::new()).unwrap();
        assert_eq!(layout.connectors.len(), 1);
        let connector = &layout.connectors[0];
        assert_eq!(connector.parent, TrackRef { tree: 0, track: 1 });
        assert_eq!(
            connector.points,
            [[0.0, -1.0], [10.0, 0.0], [20.0, -1.0]]
        );
    }

    #[test]
    fn test_lineage_mode_renumbers_lanes() {
        let forest = division_forest();
        let settings = ViewSettings {
            mode: ViewMode::Lineage,
            ..ViewSettings::default()
        };
        let selected = HashSet::from([4]);
        let layout = Layout::assign(&forest, &settings, &selected).unwrap();
        assert_eq!(layout.lane_count(), 1);
        assert_eq!(layout.lane_of(TrackRef { tree: 1, track: 0 }), Some(0));
        assert!(!layout.is_visible(TrackRef { tree: 0, track: 0 }));
        assert!(layout.connectors.is_empty());

        let empty = Layout::assign(&forest, &settings, &HashSet::new()).unwrap();
        assert_eq!(empty.lane_count(), 0);
    }

    #[test]
    fn test_feature_axis() {
        let forest = division_forest();
        let settings = ViewSettings {
            feature: Feature::Attribute,
            ..ViewSettings::default()
        };
        let layout = Layout::assign(&forest, &settings, &HashSet::new()).unwrap();
        assert_eq!(layout.tracks[0].vertices[0].position, [0.0, 20.0]);
        assert_eq!(layout.tracks[3].vertices[0].position, [30.0, 40.0]);
    }

    #[test]
    fn test_feature_axis_requires_attribute() {
        let graph = graph_from(&[(1, 0, None)]);
        let forest = decompose(&graph, Some("volume")).unwrap();
        let settings = ViewSettings {
            feature: Feature::Attribute,
            feature_key: "volume".to_string(),
            ..ViewSettings::default()
        };
        let err = Layout::assign(&forest, &settings, &HashSet::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingAttribute);
    }

    #[test]
    fn test_track_parts() {
        let graph = graph_from(&[(1, 0, None), (2, 1, Some(1)), (3, 2, Some(2)), (4, 3, Some(3))]);
        let forest = decompose(&graph, None).unwrap();
        let layout = Layout::assign(&forest, &ViewSettings::default(), &HashSet::new()).unwrap();
        let track = &layout.tracks[0];
        assert_eq!(track.resolve(TrackPart::Start, 0), Some(0));
        assert_eq!(track.resolve(TrackPart::Middle, 1), Some(2));
        assert_eq!(track.resolve(TrackPart::Middle, 2), None);
        assert_eq!(track.resolve(TrackPart::End, 0), Some(3));
        assert_eq!(track.part_of(2), (TrackPart::Middle, 1));
        assert_eq!(track.part_of(3), (TrackPart::End, 0));
    }
}
