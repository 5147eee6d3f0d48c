pub mod about;
pub mod actions;
pub mod error;
pub mod layout;
pub mod lineage;
pub mod navigation;
pub mod node_attr;
pub mod selection;
pub mod settings;
pub mod track_graph;
pub mod tracks_from_table;
pub mod tree_export;

pub use error::{ErrorCode, TrackError};
pub use navigation::NavigationEngine;
pub use track_graph::{NodeId, TrackGraph};
