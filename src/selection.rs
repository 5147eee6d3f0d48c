//! Selected vertices, most recent last. The most recent entry is the
//! navigation cursor.

use crate::lineage::{Forest, TrackRef};
use crate::track_graph::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionCursor {
    pub track: TrackRef,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    earlier: Vec<SelectionCursor>,
    cursor: Option<SelectionCursor>,
}

impl Selection {
    pub fn cursor(&self) -> Option<SelectionCursor> {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn len(&self) -> usize {
        self.earlier.len() + usize::from(self.cursor.is_some())
    }

    pub fn clear(&mut self) {
        self.earlier.clear();
        self.cursor = None;
    }

    /// Single select: the new entry becomes the only one.
    pub fn replace(&mut self, entry: SelectionCursor) {
        self.earlier.clear();
        self.cursor = Some(entry);
    }

    /// Multi select: the new entry becomes the cursor, a repeated entry moves
    /// to the end.
    pub fn append(&mut self, entry: SelectionCursor) {
        if let Some(previous) = self.cursor.take() {
            self.earlier.push(previous);
        }
        self.earlier.retain(|e| *e != entry);
        self.cursor = Some(entry);
    }

    pub fn pick(&mut self, entry: SelectionCursor, modifiers: Modifiers) {
        if modifiers.shift {
            self.append(entry);
        } else {
            self.replace(entry);
        }
    }

    /// Replaces the most recent entry. Returns false without a selection.
    pub fn move_cursor(&mut self, entry: SelectionCursor) -> bool {
        match self.cursor.as_mut() {
            Some(cursor) => {
                *cursor = entry;
                true
            }
            None => false,
        }
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = SelectionCursor> + '_ {
        self.earlier.iter().copied().chain(self.cursor)
    }

    pub fn node_ids(&self, forest: &Forest) -> Vec<NodeId> {
        self.entries()
            .filter_map(|e| forest.vertex(e.track, e.offset))
            .map(|v| v.node)
            .collect()
    }
}
