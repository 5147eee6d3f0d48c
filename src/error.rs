use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    MissingAttribute,
    DuplicateId,
    MissingColumn,
    ParentNotFound,
    UnknownNode,
    InvalidInput,
    TopologyViolation,
    LayoutInconsistency,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackError {
    pub code: ErrorCode,
    pub message: String,
}

impl TrackError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn missing_attribute(node: impl fmt::Display, key: &str) -> Self {
        Self::new(
            ErrorCode::MissingAttribute,
            format!("Required attribute '{key}' missing on {node}"),
        )
    }

    pub fn unknown_node(node: impl fmt::Display) -> Self {
        Self::new(ErrorCode::UnknownNode, format!("Node {node} is not in the graph"))
    }
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for TrackError {}

impl From<std::io::Error> for TrackError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, err.to_string())
    }
}

impl From<csv::Error> for TrackError {
    fn from(err: csv::Error) -> Self {
        let code = if err.is_io_error() {
            ErrorCode::Io
        } else {
            ErrorCode::InvalidInput
        };
        Self::new(code, format!("Could not read table: {err}"))
    }
}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::InvalidInput, format!("Could not parse JSON: {err}"))
    }
}
