//! The detection graph and its attribute/topology queries.

use crate::error::{ErrorCode, TrackError};
use crate::node_attr::{AttrValue, NodeAttr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type NodeId = i64;
pub type Edge = (NodeId, NodeId);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: NodeId,
    pub attrs: BTreeMap<String, AttrValue>,
}

/// A tracking solution. Nodes are detections carrying a position whose first
/// coordinate is time, edges link a detection to its successor one frame later.
///
/// Node storage is an arena indexed by insertion order, so `nodes()` and
/// `edges()` report insertion order.
#[derive(Clone, Debug, Default)]
pub struct TrackGraph {
    nodes: Vec<Detection>,
    index: HashMap<NodeId, usize>,
    predecessors: Vec<Vec<usize>>,
    successors: Vec<Vec<usize>>,
    edges: Vec<Edge>,
    ndim: Option<usize>,
}

impl TrackGraph {
    pub fn new(ndim: Option<usize>) -> Self {
        Self {
            ndim,
            ..Self::default()
        }
    }

    pub fn ndim(&self) -> Option<usize> {
        self.ndim
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn add_node(
        &mut self,
        id: NodeId,
        position: Vec<f64>,
        attrs: BTreeMap<String, AttrValue>,
    ) -> Result<(), TrackError> {
        if self.index.contains_key(&id) {
            return Err(TrackError::new(
                ErrorCode::DuplicateId,
                format!("Node id {id} is already in the graph"),
            ));
        }
        if let Some(ndim) = self.ndim {
            if position.len() != ndim {
                return Err(TrackError::new(
                    ErrorCode::InvalidInput,
                    format!(
                        "Position of node {id} has {} coordinates, expected {ndim}",
                        position.len()
                    ),
                ));
            }
        }
        if position.is_empty() {
            return Err(TrackError::new(
                ErrorCode::InvalidInput,
                format!("Position of node {id} has no time coordinate"),
            ));
        }
        let mut attrs = attrs;
        attrs.insert(NodeAttr::Pos.as_str().to_string(), AttrValue::Vector(position));
        self.index.insert(id, self.nodes.len());
        self.nodes.push(Detection { id, attrs });
        self.predecessors.push(vec![]);
        self.successors.push(vec![]);
        Ok(())
    }

    /// Links `parent` to `child`. The parent must already be present.
    pub fn add_edge(&mut self, parent: NodeId, child: NodeId) -> Result<(), TrackError> {
        let Some(&from) = self.index.get(&parent) else {
            return Err(TrackError::new(
                ErrorCode::ParentNotFound,
                format!("Parent id {parent} of node {child} not in graph yet"),
            ));
        };
        let to = self.slot(child)?;
        self.successors[from].push(to);
        self.predecessors[to].push(from);
        self.edges.push((parent, child));
        Ok(())
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn detection(&self, id: NodeId) -> Result<&Detection, TrackError> {
        Ok(&self.nodes[self.slot(id)?])
    }

    /// Nodes without a parent, in insertion order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .zip(&self.predecessors)
            .filter(|(_, preds)| preds.is_empty())
            .map(|(n, _)| n.id)
            .collect()
    }

    pub fn in_degree(&self, ids: Option<&[NodeId]>) -> Result<Vec<usize>, TrackError> {
        self.degrees(ids, &self.predecessors)
    }

    pub fn out_degree(&self, ids: Option<&[NodeId]>) -> Result<Vec<usize>, TrackError> {
        self.degrees(ids, &self.successors)
    }

    pub fn predecessors(&self, id: NodeId) -> Result<Vec<NodeId>, TrackError> {
        let slot = self.slot(id)?;
        Ok(self.ids_of(&self.predecessors[slot]))
    }

    pub fn successors(&self, id: NodeId) -> Result<Vec<NodeId>, TrackError> {
        let slot = self.slot(id)?;
        Ok(self.ids_of(&self.successors[slot]))
    }

    /// Looks up `key` on `id`. An absent attribute is `Ok(None)` unless
    /// `required` is set.
    pub fn get_node_attr(
        &self,
        id: NodeId,
        key: &str,
        required: bool,
    ) -> Result<Option<&AttrValue>, TrackError> {
        let value = self.nodes[self.slot(id)?].attrs.get(key);
        if required && value.is_none() {
            return Err(TrackError::missing_attribute(format!("node {id}"), key));
        }
        Ok(value)
    }

    /// Elementwise `get_node_attr`. The first failure aborts the whole batch.
    pub fn get_nodes_attr(
        &self,
        ids: &[NodeId],
        key: &str,
        required: bool,
    ) -> Result<Vec<Option<&AttrValue>>, TrackError> {
        ids.iter()
            .map(|id| self.get_node_attr(*id, key, required))
            .collect()
    }

    /// Links carry no attributes in this data model.
    pub fn get_edge_attr(
        &self,
        edge: Edge,
        key: &str,
        required: bool,
    ) -> Result<Option<&AttrValue>, TrackError> {
        if !self.edges.contains(&edge) {
            return Err(TrackError::new(
                ErrorCode::InvalidInput,
                format!("Edge {edge:?} is not in the graph"),
            ));
        }
        if required {
            return Err(TrackError::missing_attribute(format!("edge {edge:?}"), key));
        }
        Ok(None)
    }

    pub fn get_edges_attr(
        &self,
        edges: &[Edge],
        key: &str,
        required: bool,
    ) -> Result<Vec<Option<&AttrValue>>, TrackError> {
        edges
            .iter()
            .map(|edge| self.get_edge_attr(*edge, key, required))
            .collect()
    }

    pub fn position(&self, id: NodeId) -> Result<&[f64], TrackError> {
        let key = NodeAttr::Pos.as_str();
        self.get_node_attr(id, key, true)?
            .and_then(AttrValue::as_vector)
            .ok_or_else(|| {
                TrackError::new(
                    ErrorCode::InvalidInput,
                    format!("Attribute '{key}' of node {id} is not a vector"),
                )
            })
    }

    /// Frame index of `id`, the first position coordinate truncated toward zero.
    pub fn time(&self, id: NodeId) -> Result<i64, TrackError> {
        self.position(id)?
            .first()
            .map(|t| t.trunc() as i64)
            .ok_or_else(|| {
                TrackError::new(
                    ErrorCode::InvalidInput,
                    format!("Node {id} has an empty position"),
                )
            })
    }

    /// Scalar value of an optional attribute; vectors count as absent.
    pub fn scalar_attr(&self, id: NodeId, key: &str) -> Result<Option<f64>, TrackError> {
        Ok(self
            .get_node_attr(id, key, false)?
            .and_then(AttrValue::as_scalar))
    }

    fn slot(&self, id: NodeId) -> Result<usize, TrackError> {
        self.index
            .get(&id)
            .copied()
            .ok_or_else(|| TrackError::unknown_node(id))
    }

    fn ids_of(&self, slots: &[usize]) -> Vec<NodeId> {
        slots.iter().map(|s| self.nodes[*s].id).collect()
    }

    fn degrees(
        &self,
        ids: Option<&[NodeId]>,
        adjacency: &[Vec<usize>],
    ) -> Result<Vec<usize>, TrackError> {
        match ids {
            Some(ids) => ids
                .iter()
                .map(|id| self.slot(*id).map(|s| adjacency[s].len()))
                .collect(),
            None => Ok(adjacency.iter().map(|a| a.len()).collect()),
        }
    }
}
