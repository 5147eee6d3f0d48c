//! Selection state and move operations over the laid-out forest.
//!
//! The engine owns the derived forest and layout and rebuilds both wholesale
//! whenever the graph, mode or feature changes. Moves always update the most
//! recent selection entry; a move that finds no target leaves the selection
//! untouched.

use crate::actions::Action;
use crate::error::{ErrorCode, TrackError};
use crate::layout::{Layout, TrackPart};
use crate::lineage::{Forest, LineageDecomposer, TrackRef};
use crate::selection::{Modifiers, Selection, SelectionCursor};
use crate::settings::{Feature, Orientation, ViewMode, ViewSettings};
use crate::track_graph::{NodeId, TrackGraph};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Next,
    Prev,
}

#[derive(Debug, Clone)]
pub struct NavigationEngine {
    graph: Arc<TrackGraph>,
    settings: ViewSettings,
    forest: Forest,
    layout: Layout,
    selection: Selection,
    highlight: Vec<[f64; 2]>,
}

impl NavigationEngine {
    pub fn new(graph: Arc<TrackGraph>, settings: ViewSettings) -> Result<Self, TrackError> {
        settings.validate()?;
        let forest = LineageDecomposer::new(&graph, Some(settings.feature_key.as_str())).decompose()?;
        let layout = Layout::assign(&forest, &settings, &HashSet::new())?;
        Ok(Self {
            graph,
            settings,
            forest,
            layout,
            selection: Selection::default(),
            highlight: vec![],
        })
    }

    pub fn graph(&self) -> &TrackGraph {
        &self.graph
    }

    pub fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Display-space positions of the visible selected vertices.
    pub fn highlight(&self) -> &[[f64; 2]] {
        &self.highlight
    }

    /// Selected detection ids in selection order.
    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.selection.node_ids(&self.forest)
    }

    /// The detection under the cursor.
    pub fn current_node(&self) -> Option<NodeId> {
        let cursor = self.selection.cursor()?;
        self.forest.vertex(cursor.track, cursor.offset).map(|v| v.node)
    }

    /// Swaps in a new graph. The selection does not survive.
    pub fn set_graph(&mut self, graph: Arc<TrackGraph>) -> Result<(), TrackError> {
        let forest = LineageDecomposer::new(&graph, Some(self.settings.feature_key.as_str())).decompose()?;
        let layout = Layout::assign(&forest, &self.settings, &HashSet::new())?;
        self.graph = graph;
        self.forest = forest;
        self.layout = layout;
        self.selection.clear();
        self.refresh_highlight();
        Ok(())
    }

    /// A pick reported by the rendering surface.
    pub fn pick(
        &mut self,
        track: TrackRef,
        offset: usize,
        modifiers: Modifiers,
    ) -> Result<(), TrackError> {
        if self.layout.vertex(track, offset).is_none() {
            return Err(TrackError::new(
                ErrorCode::InvalidInput,
                format!("No visible vertex at offset {offset} of track {track:?}"),
            ));
        }
        self.selection.pick(SelectionCursor { track, offset }, modifiers);
        self.after_selection_change()
    }

    /// A pick reported as a rendered marker group and an index inside it.
    pub fn pick_part(
        &mut self,
        track: TrackRef,
        part: TrackPart,
        index: usize,
        modifiers: Modifiers,
    ) -> Result<(), TrackError> {
        let offset = self
            .layout
            .track(track)
            .and_then(|t| t.resolve(part, index))
            .ok_or_else(|| {
                TrackError::new(
                    ErrorCode::InvalidInput,
                    format!("No visible vertex {index} in the {part:?} group of track {track:?}"),
                )
            })?;
        self.pick(track, offset, modifiers)
    }

    /// Selects a detection by id, also when its tree is currently hidden.
    pub fn select_node(&mut self, node: NodeId, modifiers: Modifiers) -> Result<(), TrackError> {
        let (track, offset) = self
            .forest
            .locate(node)
            .ok_or_else(|| TrackError::unknown_node(node))?;
        self.selection.pick(SelectionCursor { track, offset }, modifiers);
        self.after_selection_change()
    }

    pub fn clear_selection(&mut self) -> Result<(), TrackError> {
        self.selection.clear();
        self.after_selection_change()
    }

    pub fn set_mode(&mut self, mode: ViewMode) -> Result<(), TrackError> {
        let previous = self.settings.mode;
        self.settings.mode = mode;
        if let Err(e) = self.relayout() {
            self.settings.mode = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn toggle_mode(&mut self) -> Result<(), TrackError> {
        self.set_mode(self.settings.mode.toggled())
    }

    /// Changing the feature rebuilds the forest; on failure (e.g. a missing
    /// attribute) the previous feature stays active.
    pub fn set_feature(&mut self, feature: Feature) -> Result<(), TrackError> {
        let mut settings = self.settings.clone();
        settings.feature = feature;
        self.rebuild(settings)
    }

    pub fn toggle_feature(&mut self) -> Result<(), TrackError> {
        self.set_feature(self.settings.feature.toggled())
    }

    pub fn set_feature_key(&mut self, key: &str) -> Result<(), TrackError> {
        let mut settings = self.settings.clone();
        settings.feature_key = key.to_string();
        self.rebuild(settings)
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.settings.orientation = orientation;
        self.refresh_highlight();
    }

    pub fn flip_orientation(&mut self) {
        self.set_orientation(self.settings.orientation.flipped());
    }

    /// Runs one input action. Moves report whether the selection changed.
    pub fn apply(&mut self, action: Action) -> Result<bool, TrackError> {
        let moved = match action {
            Action::SelectNextCell => self.select_next_cell(),
            Action::SelectPrevCell => self.select_prev_cell(),
            Action::SelectNextLineage => self.select_next_lineage(),
            Action::SelectPrevLineage => self.select_prev_lineage(),
            Action::SelectNextFeature => self.select_next_feature(),
            Action::SelectPrevFeature => self.select_prev_feature(),
            Action::ToggleMode => {
                self.toggle_mode()?;
                false
            }
            Action::ToggleFeature => {
                self.toggle_feature()?;
                false
            }
            Action::FlipOrientation => {
                self.flip_orientation();
                false
            }
        };
        trace!(%action, moved, "applied action");
        Ok(moved)
    }

    pub fn select_next_cell(&mut self) -> bool {
        let target = self.cell_target(Step::Next);
        self.move_to(target)
    }

    pub fn select_prev_cell(&mut self) -> bool {
        let target = self.cell_target(Step::Prev);
        self.move_to(target)
    }

    pub fn select_next_lineage(&mut self) -> bool {
        let target = self.lineage_target(Step::Next);
        self.move_to(target)
    }

    pub fn select_prev_lineage(&mut self) -> bool {
        let target = self.lineage_target(Step::Prev);
        self.move_to(target)
    }

    pub fn select_next_feature(&mut self) -> bool {
        let target = self.feature_target(Step::Next);
        self.move_to(target)
    }

    pub fn select_prev_feature(&mut self) -> bool {
        let target = self.feature_target(Step::Prev);
        self.move_to(target)
    }

    fn cell_target(&self, step: Step) -> Option<SelectionCursor> {
        let cursor = self.selection.cursor()?;
        let track = self.forest.track(cursor.track)?;
        let tree = &self.forest.trees[cursor.track.tree];
        let in_tree = |track: usize| TrackRef {
            tree: cursor.track.tree,
            track,
        };
        match step {
            Step::Next if cursor.offset + 1 < track.len() => Some(SelectionCursor {
                offset: cursor.offset + 1,
                ..cursor
            }),
            Step::Next if track.ends_in_division() => {
                match tree.division_children(cursor.track.track) {
                    Ok((first, _)) => Some(SelectionCursor {
                        track: in_tree(first),
                        offset: 0,
                    }),
                    Err(e) => {
                        warn!("cannot descend into division: {e}");
                        None
                    }
                }
            }
            Step::Next => None,
            Step::Prev if cursor.offset > 0 => Some(SelectionCursor {
                offset: cursor.offset - 1,
                ..cursor
            }),
            Step::Prev if track.is_root() => None,
            Step::Prev => {
                let Some(parent) = tree.division_parent(cursor.track.track) else {
                    warn!(
                        node = track.first().node,
                        "no division parent track found within the tree"
                    );
                    return None;
                };
                let offset = tree.tracks[parent].len() - 1;
                Some(SelectionCursor {
                    track: in_tree(parent),
                    offset,
                })
            }
        }
    }

    fn lineage_target(&self, step: Step) -> Option<SelectionCursor> {
        let cursor = self.selection.cursor()?;
        let time = self.forest.vertex(cursor.track, cursor.offset)?.time;
        let lane = self.layout.lane_of(cursor.track)?;
        let lanes: Box<dyn Iterator<Item = usize>> = match step {
            Step::Next => Box::new(lane + 1..self.layout.lane_count()),
            Step::Prev => Box::new((0..lane).rev()),
        };
        for (distance, candidate) in lanes.enumerate() {
            let placed = &self.layout.tracks[candidate];
            if let Some(offset) = placed.offset_at(time) {
                trace!(from = lane, to = candidate, distance = distance + 1, "lineage move");
                return Some(SelectionCursor {
                    track: placed.track_ref,
                    offset,
                });
            }
        }
        None
    }

    fn feature_target(&self, step: Step) -> Option<SelectionCursor> {
        let cursor = self.selection.cursor()?;
        let current = self.forest.vertex(cursor.track, cursor.offset)?;
        let value = current.feature?;
        let mut best: Option<(SelectionCursor, f64)> = None;
        for (track, offset, vertex) in self.layout.vertices_at(current.time) {
            let Some(candidate) = vertex.feature else {
                continue;
            };
            let qualifies = match step {
                Step::Next => candidate > value,
                Step::Prev => candidate < value,
            };
            if !qualifies {
                continue;
            }
            let closer = match (step, best) {
                (_, None) => true,
                (Step::Next, Some((_, b))) => candidate < b,
                (Step::Prev, Some((_, b))) => candidate > b,
            };
            if closer {
                best = Some((SelectionCursor { track, offset }, candidate));
            }
        }
        best.map(|(target, _)| target)
    }

    fn move_to(&mut self, target: Option<SelectionCursor>) -> bool {
        let Some(target) = target else {
            return false;
        };
        if !self.layout.is_visible(target.track) || !self.selection.move_cursor(target) {
            return false;
        }
        if self.settings.mode == ViewMode::Lineage {
            // The cursor may have left the only selected node of a tree.
            if let Err(e) = self.relayout() {
                warn!("relayout after move failed: {e}");
            }
        } else {
            self.refresh_highlight();
        }
        true
    }

    fn after_selection_change(&mut self) -> Result<(), TrackError> {
        if self.settings.mode == ViewMode::Lineage {
            self.relayout()
        } else {
            self.refresh_highlight();
            Ok(())
        }
    }

    fn rebuild(&mut self, settings: ViewSettings) -> Result<(), TrackError> {
        settings.validate()?;
        let forest = LineageDecomposer::new(&self.graph, Some(settings.feature_key.as_str())).decompose()?;
        let selected = self.selected_set();
        let layout = Layout::assign(&forest, &settings, &selected)?;
        self.settings = settings;
        self.forest = forest;
        self.layout = layout;
        self.refresh_highlight();
        Ok(())
    }

    fn relayout(&mut self) -> Result<(), TrackError> {
        let selected = self.selected_set();
        self.layout = Layout::assign(&self.forest, &self.settings, &selected)?;
        self.refresh_highlight();
        Ok(())
    }

    fn selected_set(&self) -> HashSet<NodeId> {
        self.selected_nodes().into_iter().collect()
    }

    fn refresh_highlight(&mut self) {
        let orientation = self.settings.orientation;
        self.highlight = self
            .selection
            .entries()
            .filter_map(|e| self.layout.vertex(e.track, e.offset))
            .map(|v| orientation.apply(v.position))
            .collect();
        debug!(
            selected = self.selection.len(),
            highlighted = self.highlight.len(),
            "selection updated"
        );
    }
}
