//! Transaction management.
//!
//! Every multi-edge mutation runs inside one transaction value that is passed
//! through the call and committed once. Preconditions that a concurrent writer
//! could invalidate between the check and the write are registered as
//! [`EdgeGuard`]s and re-verified atomically at commit.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::{Direction, EdgeKind, ObjectRef, Value};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Transaction trait that all stores must implement.
pub trait Transaction: Send + Sync {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;
}

/// Commit-time precondition: `node` must have no committed edge of `kind`
/// in `direction` carrying any of `labels` (and `property`, when set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeGuard {
    pub node: ObjectRef,
    pub direction: Direction,
    pub kind: EdgeKind,
    pub labels: SmallVec<[String; 2]>,
    pub property: Option<(String, Value)>,
    /// Message reported when the guard fails.
    pub reason: String,
}

impl EdgeGuard {
    pub fn absent(
        node: ObjectRef,
        direction: Direction,
        kind: EdgeKind,
        labels: &[&str],
        reason: impl Into<String>,
    ) -> Self {
        Self {
            node,
            direction,
            kind,
            labels: labels.iter().map(|l| (*l).to_owned()).collect(),
            property: None,
            reason: reason.into(),
        }
    }

    /// Narrow the guard to edges whose `key` property equals `value`.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.property = Some((key.into(), value.into()));
        self
    }

    /// Whether an edge with this shape violates the guard.
    pub fn is_violated_by(&self, edge: &crate::model::Edge) -> bool {
        edge.kind == self.kind
            && edge.matches_direction(&self.node, self.direction)
            && edge.label.as_deref().is_some_and(|l| self.labels.iter().any(|g| g == l))
            && self.property.as_ref().is_none_or(|(key, value)| {
                edge.properties.get(key).is_some_and(|found| {
                    found == value || found.as_int().is_some_and(|v| value.as_int() == Some(v))
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeId};

    #[test]
    fn test_guard_matches_label_and_direction() {
        let port = ObjectRef::new("ElectricalPort", "p1");
        let link = ObjectRef::new("ElectricalLink", "l1");
        let guard = EdgeGuard::absent(
            port.clone(),
            Direction::Incoming,
            EdgeKind::RelatedTo,
            &["endpointA", "endpointB"],
            "port is connected",
        );

        let endpoint = Edge::new(EdgeId(1), EdgeKind::RelatedTo, link.clone(), port.clone())
            .with_label("endpointB");
        let mirror = Edge::new(EdgeId(2), EdgeKind::RelatedTo, port.clone(), link)
            .with_label("mirror");

        assert!(guard.is_violated_by(&endpoint));
        assert!(!guard.is_violated_by(&mirror));
    }

    #[test]
    fn test_guard_narrowed_by_property() {
        let carrier = ObjectRef::new("STM16", "t1");
        let guard = EdgeGuard::absent(
            carrier.clone(),
            Direction::Outgoing,
            EdgeKind::RelatedTo,
            &["sdhTransports"],
            "position 3 taken",
        )
        .with_property("sdhPosition", 3u32);

        let slot = |id, position: &str| {
            Edge::new(EdgeId(id), EdgeKind::RelatedTo, carrier.clone(), ObjectRef::new("VC4", "c"))
                .with_label("sdhTransports")
                .with_property("sdhPosition", position)
        };
        assert!(guard.is_violated_by(&slot(1, "3")));
        assert!(!guard.is_violated_by(&slot(2, "4")));
    }
}
