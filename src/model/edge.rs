//! Edges between inventory nodes.

use serde::{Deserialize, Serialize};
use super::{ObjectRef, PropertyMap, Value};

/// Opaque edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup direction relative to the node being inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// The relationship family an edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Standard containment, `child -> parent`.
    ChildOf,
    /// Special containment, `child -> parent` (pools, special children).
    ChildOfSpecial,
    /// Labeled model-dependent relationship (mirrors, endpoints, SDH/MPLS).
    RelatedTo,
}

/// A directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub kind: EdgeKind,
    /// Relationship name. `None` for plain containment.
    pub label: Option<String>,
    pub src: ObjectRef,
    pub dst: ObjectRef,
    pub properties: PropertyMap,
}

impl Edge {
    pub fn new(id: EdgeId, kind: EdgeKind, src: ObjectRef, dst: ObjectRef) -> Self {
        Self {
            id,
            kind,
            label: None,
            src,
            dst,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label.as_deref() == Some(label)
    }

    pub fn touches(&self, node: &ObjectRef) -> bool {
        &self.src == node || &self.dst == node
    }

    /// Whether this edge is visible from `node` in direction `dir`.
    pub fn matches_direction(&self, node: &ObjectRef, dir: Direction) -> bool {
        match dir {
            Direction::Outgoing => &self.src == node,
            Direction::Incoming => &self.dst == node,
            Direction::Both => self.touches(node),
        }
    }

    /// The "other" end of the edge from the given node.
    pub fn other_end(&self, from: &ObjectRef) -> Option<&ObjectRef> {
        if from == &self.src { Some(&self.dst) }
        else if from == &self.dst { Some(&self.src) }
        else { None }
    }
}
