//! Discrete named input actions and the arrow-key mapping onto them.

use crate::settings::Orientation;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    SelectNextCell,
    SelectPrevCell,
    SelectNextLineage,
    SelectPrevLineage,
    SelectNextFeature,
    SelectPrevFeature,
    ToggleMode,
    ToggleFeature,
    FlipOrientation,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::SelectNextCell,
        Action::SelectPrevCell,
        Action::SelectNextLineage,
        Action::SelectPrevLineage,
        Action::SelectNextFeature,
        Action::SelectPrevFeature,
        Action::ToggleMode,
        Action::ToggleFeature,
        Action::FlipOrientation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectNextCell => "select-next-cell",
            Self::SelectPrevCell => "select-prev-cell",
            Self::SelectNextLineage => "select-next-lineage",
            Self::SelectPrevLineage => "select-prev-lineage",
            Self::SelectNextFeature => "select-next-feature",
            Self::SelectPrevFeature => "select-prev-feature",
            Self::ToggleMode => "toggle-mode",
            Self::ToggleFeature => "toggle-feature",
            Self::FlipOrientation => "flip-orientation",
        }
    }

    /// Accepts the kebab-case name or an arrow key name (`left`, `up`, ...),
    /// the latter resolved for `orientation`.
    pub fn parse(text: &str, orientation: Orientation) -> Option<Self> {
        let norm = text.trim().to_ascii_lowercase().replace('_', "-");
        if let Some(action) = Self::ALL.iter().find(|a| a.as_str() == norm) {
            return Some(*action);
        }
        Direction::parse(&norm).map(|d| Self::from_arrow(d, orientation))
    }

    /// Time runs down in the vertical view and right in the horizontal one.
    pub fn from_arrow(direction: Direction, orientation: Orientation) -> Self {
        match (orientation, direction) {
            (Orientation::Vertical, Direction::Up) => Self::SelectPrevCell,
            (Orientation::Vertical, Direction::Down) => Self::SelectNextCell,
            (Orientation::Vertical, Direction::Left) => Self::SelectPrevLineage,
            (Orientation::Vertical, Direction::Right) => Self::SelectNextLineage,
            (Orientation::Horizontal, Direction::Left) => Self::SelectPrevCell,
            (Orientation::Horizontal, Direction::Right) => Self::SelectNextCell,
            (Orientation::Horizontal, Direction::Up) => Self::SelectNextLineage,
            (Orientation::Horizontal, Direction::Down) => Self::SelectPrevLineage,
        }
    }

    pub fn is_move(self) -> bool {
        !matches!(
            self,
            Self::ToggleMode | Self::ToggleFeature | Self::FlipOrientation
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}
