use crate::error::{ErrorCode, TrackError};
use crate::node_attr::NodeAttr;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANE_SPACING: f64 = 10.0;

/// Which lineage trees are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    All,
    /// Only trees holding a selected detection.
    Lineage,
}

/// The quantity plotted along the lane axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Negative time, so time increases downward.
    #[default]
    Tree,
    /// The scalar attribute named by `ViewSettings::feature_key`.
    #[serde(alias = "area")]
    Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::All => Self::Lineage,
            Self::Lineage => Self::All,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "lineage" => Some(Self::Lineage),
            _ => None,
        }
    }
}

impl Feature {
    pub fn toggled(self) -> Self {
        match self {
            Self::Tree => Self::Attribute,
            Self::Attribute => Self::Tree,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "tree" => Some(Self::Tree),
            "attribute" | "area" | "feature" => Some(Self::Attribute),
            _ => None,
        }
    }
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Self::Vertical => Self::Horizontal,
            Self::Horizontal => Self::Vertical,
        }
    }

    /// Maps a layout position (lane axis, feature axis) to display space.
    pub fn apply(self, position: [f64; 2]) -> [f64; 2] {
        match self {
            Self::Vertical => position,
            Self::Horizontal => [-position[1], position[0]],
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "vertical" => Some(Self::Vertical),
            "horizontal" => Some(Self::Horizontal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub mode: ViewMode,
    pub feature: Feature,
    pub feature_key: String,
    pub orientation: Orientation,
    pub lane_spacing: f64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            mode: ViewMode::default(),
            feature: Feature::default(),
            feature_key: NodeAttr::Area.as_str().to_string(),
            orientation: Orientation::default(),
            lane_spacing: DEFAULT_LANE_SPACING,
        }
    }
}

impl ViewSettings {
    pub fn load_from_path(path: &str) -> Result<Self, TrackError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrackError::new(
                ErrorCode::Io,
                format!("Could not read settings file '{path}': {e}"),
            )
        })?;
        let settings: Self = serde_json::from_str(&text).map_err(|e| {
            TrackError::new(
                ErrorCode::InvalidInput,
                format!("Could not parse settings JSON '{path}': {e}"),
            )
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to_path(&self, path: &str) -> Result<(), TrackError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| {
            TrackError::new(
                ErrorCode::Io,
                format!("Could not write settings file '{path}': {e}"),
            )
        })
    }

    pub fn validate(&self) -> Result<(), TrackError> {
        if !(self.lane_spacing.is_finite() && self.lane_spacing > 0.0) {
            return Err(TrackError::new(
                ErrorCode::InvalidInput,
                format!("lane_spacing must be positive, got {}", self.lane_spacing),
            ));
        }
        if self.feature_key.trim().is_empty() {
            return Err(TrackError::new(
                ErrorCode::InvalidInput,
                "feature_key must name an attribute",
            ));
        }
        Ok(())
    }
}
