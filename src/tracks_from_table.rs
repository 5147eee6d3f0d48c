//! Builds a `TrackGraph` from tabular rows `t,[z],y,x,id,parent_id,...`.
//!
//! Cells without a parent hold an empty value or `-1` in `parent_id`. Columns
//! other than the required ones become node attributes; arrays serialized as
//! `[a, b, ...]` are decoded back into numeric vectors.

use crate::error::{ErrorCode, TrackError};
use crate::node_attr::{AttrValue, NodeAttr};
use crate::track_graph::{NodeId, TrackGraph};
use csv::{ReaderBuilder, StringRecord};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const ID_COLUMN: &str = "id";
const PARENT_COLUMN: &str = "parent_id";
const TIME_ALIAS: &str = "t";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableRow {
    pub id: NodeId,
    pub time: f64,
    pub z: Option<f64>,
    pub y: f64,
    pub x: f64,
    pub parent_id: Option<NodeId>,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl TableRow {
    fn position(&self) -> Vec<f64> {
        match self.z {
            Some(z) => vec![self.time, z, self.y, self.x],
            None => vec![self.time, self.y, self.x],
        }
    }
}

struct ColumnMap {
    id: usize,
    time: usize,
    z: Option<usize>,
    y: usize,
    x: usize,
    parent_id: usize,
    extra: Vec<(usize, String)>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, TrackError> {
        let names: Vec<&str> = headers.iter().map(str::trim).collect();
        let find = |name: &str| names.iter().position(|h| *h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                TrackError::new(
                    ErrorCode::MissingColumn,
                    format!("Required column {name} not found in columns {names:?}"),
                )
            })
        };
        let time_name = if find(NodeAttr::Time.as_str()).is_some() {
            NodeAttr::Time.as_str()
        } else {
            TIME_ALIAS
        };
        let id = require(ID_COLUMN)?;
        let time = require(time_name).map_err(|_| {
            TrackError::new(
                ErrorCode::MissingColumn,
                format!("Required column time (or t) not found in columns {names:?}"),
            )
        })?;
        let y = require("y")?;
        let x = require("x")?;
        let parent_id = require(PARENT_COLUMN)?;
        let z = find("z");
        let fixed = [Some(id), Some(time), z, Some(y), Some(x), Some(parent_id)];
        let extra = names
            .iter()
            .enumerate()
            .filter(|(idx, _)| !fixed.contains(&Some(*idx)))
            .map(|(idx, name)| (idx, name.to_string()))
            .collect();
        Ok(Self {
            id,
            time,
            z,
            y,
            x,
            parent_id,
            extra,
        })
    }
}

fn cell<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).map(str::trim).unwrap_or("")
}

fn parse_number(record: &StringRecord, idx: usize, column: &str, line: usize) -> Result<f64, TrackError> {
    let text = cell(record, idx);
    text.parse::<f64>().map_err(|_| {
        TrackError::new(
            ErrorCode::InvalidInput,
            format!("Row {line}: column {column} holds '{text}', expected a number"),
        )
    })
}

/// Frames are whole, finite numbers; `3.0` is accepted.
fn parse_frame(record: &StringRecord, idx: usize, line: usize) -> Result<f64, TrackError> {
    let time = parse_number(record, idx, "time", line)?;
    if !time.is_finite() || time.fract() != 0.0 {
        return Err(TrackError::new(
            ErrorCode::InvalidInput,
            format!("Row {line}: time '{}' is not a whole frame index", cell(record, idx)),
        ));
    }
    Ok(time)
}

fn parse_id(text: &str) -> Option<NodeId> {
    if let Ok(id) = text.parse::<NodeId>() {
        return Some(id);
    }
    // Integer columns that went through a float round trip, e.g. "12.0".
    let value = text.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value.is_finite()).then_some(value as NodeId)
}

fn parse_parent(text: &str, line: usize) -> Result<Option<NodeId>, TrackError> {
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    match parse_id(text) {
        Some(-1) => Ok(None),
        Some(id) => Ok(Some(id)),
        None => Err(TrackError::new(
            ErrorCode::InvalidInput,
            format!("Row {line}: parent_id '{text}' is not an integer"),
        )),
    }
}

fn parse_row(record: &StringRecord, columns: &ColumnMap, line: usize) -> Result<TableRow, TrackError> {
    let id_text = cell(record, columns.id);
    let id = parse_id(id_text).ok_or_else(|| {
        TrackError::new(
            ErrorCode::InvalidInput,
            format!("Row {line}: id '{id_text}' is not an integer"),
        )
    })?;
    let z = match columns.z {
        Some(idx) => Some(parse_number(record, idx, "z", line)?),
        None => None,
    };
    let mut attrs = BTreeMap::new();
    for (idx, name) in &columns.extra {
        match AttrValue::parse_cell(cell(record, *idx)) {
            Ok(Some(value)) => {
                attrs.insert(name.clone(), value);
            }
            Ok(None) => {}
            Err(e) => warn!(node = id, column = %name, "dropping attribute cell: {e}"),
        }
    }
    Ok(TableRow {
        id,
        time: parse_frame(record, columns.time, line)?,
        z,
        y: parse_number(record, columns.y, "y", line)?,
        x: parse_number(record, columns.x, "x", line)?,
        parent_id: parse_parent(cell(record, columns.parent_id), line)?,
        attrs,
    })
}

/// Builds the graph from already-parsed rows. Rows are processed in ascending
/// time order so parents are inserted before their children.
pub fn tracks_from_rows(mut rows: Vec<TableRow>) -> Result<TrackGraph, TrackError> {
    let mut seen = HashSet::with_capacity(rows.len());
    if let Some(dup) = rows.iter().find(|row| !seen.insert(row.id)) {
        return Err(TrackError::new(
            ErrorCode::DuplicateId,
            format!("The 'id' column must contain unique values (id {} repeats)", dup.id),
        ));
    }
    let ndim = if rows.iter().any(|row| row.z.is_some()) { 4 } else { 3 };
    if ndim == 4 && rows.iter().any(|row| row.z.is_none()) {
        return Err(TrackError::new(
            ErrorCode::InvalidInput,
            "Column z must be filled for every row when present",
        ));
    }
    rows.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut graph = TrackGraph::new(Some(ndim));
    for row in rows {
        let position = row.position();
        graph.add_node(row.id, position, row.attrs)?;
        if let Some(parent) = row.parent_id {
            graph.add_edge(parent, row.id)?;
        }
    }
    debug!(
        nodes = graph.len(),
        edges = graph.edges().len(),
        ndim,
        "built track graph"
    );
    Ok(graph)
}

pub fn tracks_from_csv_reader<R: Read>(reader: R) -> Result<TrackGraph, TrackError> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let columns = ColumnMap::from_headers(rdr.headers()?)?;
    let mut rows = vec![];
    for (idx, record) in rdr.records().enumerate() {
        // Header is line 1.
        rows.push(parse_row(&record?, &columns, idx + 2)?);
    }
    tracks_from_rows(rows)
}

pub fn tracks_from_csv_path(path: impl AsRef<Path>) -> Result<TrackGraph, TrackError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        TrackError::new(
            ErrorCode::Io,
            format!("Could not open tracks table '{}': {e}", path.display()),
        )
    })?;
    tracks_from_csv_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> Result<TrackGraph, TrackError> {
        tracks_from_csv_reader(text.as_bytes())
    }

    #[test]
    fn test_basic_table() {
        let graph = load(
            "id,time,y,x,parent_id,area,track_id\n\
             2,1,5.0,6.0,1,30,1\n\
             1,0,5.0,5.0,-1,25,1\n\
             3,2,5.5,6.5,2,,1\n",
        )
        .unwrap();
        assert_eq!(graph.nodes(), vec![1, 2, 3]);
        assert_eq!(graph.edges(), &[(1, 2), (2, 3)]);
        assert_eq!(graph.ndim(), Some(3));
        assert_eq!(graph.position(2).unwrap(), &[1.0, 5.0, 6.0]);
        assert_eq!(graph.scalar_attr(1, "area").unwrap(), Some(25.0));
        assert_eq!(graph.get_node_attr(3, "area", false).unwrap(), None);
        assert_eq!(graph.scalar_attr(3, "track_id").unwrap(), Some(1.0));
        assert_eq!(graph.get_node_attr(1, "parent_id", false).unwrap(), None);
    }

    #[test]
    fn test_z_column_and_time_alias() {
        let graph = load(
            "t,z,y,x,id,parent_id,bbox\n\
             0,1.5,2,3,10,,\"[1, 2, 3, 4]\"\n\
             1,1.5,2,3,11,10.0,\n",
        )
        .unwrap();
        assert_eq!(graph.ndim(), Some(4));
        assert_eq!(graph.position(11).unwrap(), &[1.0, 1.5, 2.0, 3.0]);
        assert_eq!(
            graph.get_node_attr(10, "bbox", true).unwrap(),
            Some(&AttrValue::Vector(vec![1.0, 2.0, 3.0, 4.0]))
        );
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = load(
            "id,time,y,x,parent_id\n\
             5,0,0,0,\n\
             5,1,0,0,\n",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateId);
    }

    #[test]
    fn test_missing_parent_rejected() {
        let err = load(
            "id,time,y,x,parent_id\n\
             1,0,0,0,\n\
             2,1,0,0,9\n",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ParentNotFound);
    }

    #[test]
    fn test_child_before_parent_in_time_rejected() {
        let err = load(
            "id,time,y,x,parent_id\n\
             1,3,0,0,\n\
             2,1,0,0,1\n",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ParentNotFound);
    }

    #[test]
    fn test_missing_column() {
        let err = load("id,time,y,parent_id\n1,0,0,\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingColumn);
        assert!(err.message.contains('x'));
    }

    #[test]
    fn test_time_must_be_whole_frame() {
        for time in ["1.6", "nan", "inf"] {
            let err = load(&format!(
                "id,time,y,x,parent_id\n\
                 1,0,0,0,\n\
                 2,{time},0,0,1\n"
            ))
            .unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidInput, "time {time}");
        }
        let graph = load("id,time,y,x,parent_id\n1,2.0,0,0,\n").unwrap();
        assert_eq!(graph.time(1).unwrap(), 2);
    }

    #[test]
    fn test_text_attribute_dropped() {
        let graph = load(
            "id,time,y,x,parent_id,label\n\
             1,0,0,0,,mitotic\n",
        )
        .unwrap();
        assert_eq!(graph.get_node_attr(1, "label", false).unwrap(), None);
    }
}
