//! Attribute values stored on detections and the well-known attribute keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute keys with a fixed meaning. All other keys pass through opaquely.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NodeAttr {
    Pos,
    Time,
    Area,
    TrackId,
}

impl NodeAttr {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pos => "pos",
            Self::Time => "time",
            Self::Area => "area",
            Self::TrackId => "track_id",
        }
    }
}

impl fmt::Display for NodeAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Vector(Vec<f64>),
}

impl AttrValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Self::Number(_) => None,
            Self::Vector(v) => Some(v),
        }
    }

    /// Decodes a table cell. Empty cells are absent, `[a, b]` becomes a vector
    /// and anything else must parse as a number.
    pub fn parse_cell(text: &str) -> Result<Option<Self>, String> {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }
        if text.starts_with('[') && text.ends_with(']') {
            return serde_json::from_str::<Vec<f64>>(text)
                .map(|v| Some(Self::Vector(v)))
                .map_err(|e| format!("Could not decode array '{text}': {e}"));
        }
        text.parse::<f64>()
            .map(|v| Some(Self::Number(v)))
            .map_err(|_| format!("'{text}' is neither a number nor a numeric array"))
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Vector(v) => {
                let parts = v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_and_empty() {
        assert_eq!(
            AttrValue::parse_cell(" 42.5 ").unwrap(),
            Some(AttrValue::Number(42.5))
        );
        assert_eq!(AttrValue::parse_cell("").unwrap(), None);
        assert_eq!(AttrValue::parse_cell("NaN").unwrap(), None);
    }

    #[test]
    fn test_parse_serialized_array() {
        let value = AttrValue::parse_cell("[1, 2.5, -3]").unwrap().unwrap();
        assert_eq!(value.as_vector(), Some(&[1.0, 2.5, -3.0][..]));
        assert_eq!(value.as_scalar(), None);
        assert_eq!(value.to_string(), "[1, 2.5, -3]");
    }

    #[test]
    fn test_parse_rejects_text() {
        assert!(AttrValue::parse_cell("mitosis").is_err());
        assert!(AttrValue::parse_cell("[a, b]").is_err());
    }
}
