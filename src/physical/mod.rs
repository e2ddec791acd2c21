//! # Physical Connectivity Tracer
//!
//! Ports, links and containers, connected through labeled `RelatedTo`
//! edges:
//!
//! ```text
//! link ──endpointA──▶ port        port ──mirror──▶ port
//! link ──endpointB──▶ port
//! ```
//!
//! A tracer is bound to one [`ConnectionFamily`], which fixes the base
//! class of its connections and the endpoint labels it reads and writes.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use std::collections::VecDeque;

use crate::context::Ctx;
use crate::hierarchy::HierarchyResolver;
use crate::model::*;
use crate::schema::{self, ClassHierarchy};
use crate::storage::ObjectStore;
use crate::tx::{EdgeGuard, TxMode};
use crate::{Error, Result};

pub const MIRROR: &str = "mirror";
pub const MIRROR_MULTIPLE: &str = "mirrorMultiple";
const MIRROR_LABELS: [&str; 2] = [MIRROR, MIRROR_MULTIPLE];

// ============================================================================
// Families and sides
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionFamily {
    /// Physical links and containers.
    Physical,
    /// MPLS links between ports and pseudo-ports.
    Mpls,
}

impl ConnectionFamily {
    pub fn base_class(self) -> &'static str {
        match self {
            Self::Physical => schema::GENERIC_PHYSICAL_CONNECTION,
            Self::Mpls => schema::MPLS_LINK,
        }
    }

    pub fn endpoint_a(self) -> &'static str {
        match self {
            Self::Physical => "endpointA",
            Self::Mpls => "mplsEndpointA",
        }
    }

    pub fn endpoint_b(self) -> &'static str {
        match self {
            Self::Physical => "endpointB",
            Self::Mpls => "mplsEndpointB",
        }
    }

    pub fn endpoint_labels(self) -> [&'static str; 2] {
        [self.endpoint_a(), self.endpoint_b()]
    }

    /// Classes whose instances may sit at either end of a connection.
    pub fn port_classes(self) -> SmallVec<[&'static str; 5]> {
        match self {
            Self::Physical => smallvec![schema::GENERIC_PORT],
            Self::Mpls => smallvec![
                schema::GENERIC_PORT,
                "VRFInstance",
                "BridgeDomain",
                "MPLSTunnel",
                "Pseudowire",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
    Both,
}

impl Side {
    pub fn labels(self, family: ConnectionFamily) -> SmallVec<[&'static str; 2]> {
        match self {
            Self::A => smallvec![family.endpoint_a()],
            Self::B => smallvec![family.endpoint_b()],
            Self::Both => SmallVec::from_buf(family.endpoint_labels()),
        }
    }
}

// ============================================================================
// PhysicalTracer
// ============================================================================

pub struct PhysicalTracer<'a, S, C> {
    ctx: Ctx<'a, S, C>,
    family: ConnectionFamily,
}

impl<'a, S: ObjectStore, C: ClassHierarchy> PhysicalTracer<'a, S, C> {
    pub(crate) fn new(ctx: Ctx<'a, S, C>, family: ConnectionFamily) -> Self {
        Self { ctx, family }
    }

    pub fn family(&self) -> ConnectionFamily {
        self.family
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Ports and links from `port` outwards, mirror hops preferred. Stops at
    /// a port with nothing left to visit. `[port]` when it is unconnected.
    #[tracing::instrument(skip(self))]
    pub async fn physical_path(&self, port: &ObjectRef) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.physical_path_in(&tx, port).await;
        self.ctx.finish(tx, result).await
    }

    /// Breadth-first expansion over every mirror and endpoint edge reachable
    /// from `port`. Each entry is a node with the nodes first discovered
    /// from it, in discovery order.
    #[tracing::instrument(skip(self))]
    pub async fn physical_tree(&self, port: &ObjectRef) -> Result<Vec<(ObjectRef, Vec<ObjectRef>)>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.physical_tree_in(&tx, port).await;
        self.ctx.finish(tx, result).await
    }

    /// Either side may be missing on a half-provisioned link.
    pub async fn endpoints(&self, link: &ObjectRef) -> Result<(Option<ObjectRef>, Option<ObjectRef>)> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result: Result<(Option<ObjectRef>, Option<ObjectRef>)> = async {
            self.ctx.require(&tx, link).await?;
            self.endpoints_in(&tx, link).await
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    pub async fn link_connected_to_port(&self, port: &ObjectRef) -> Result<Option<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result: Result<Option<ObjectRef>> = async {
            self.ctx.require(&tx, port).await?;
            Ok(self.attached_links(&tx, port).await?.into_iter().next())
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Connect `a` and `b` with a new link of `link_class`, or with the
    /// existing, unconnected link `link_id`.
    #[tracing::instrument(skip(self))]
    pub async fn connect(
        &self,
        a: &ObjectRef,
        b: &ObjectRef,
        link_class: &str,
        link_id: Option<&str>,
        name: &str,
    ) -> Result<ObjectRef> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result = self.connect_in(&mut tx, a, b, link_class, link_id, name).await;
        self.ctx.finish(tx, result).await
    }

    /// Release one or both sides of a connection. Empty sides are ignored.
    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self, link: &ObjectRef, side: Side) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result = self.disconnect_in(&mut tx, link, side).await;
        self.ctx.finish(tx, result).await
    }

    /// Point the given sides at new ends. Containers nested in `link` are
    /// not re-validated.
    #[tracing::instrument(skip(self))]
    pub async fn reconnect(
        &self,
        link: &ObjectRef,
        new_a: Option<&ObjectRef>,
        new_b: Option<&ObjectRef>,
    ) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result = self.reconnect_in(&mut tx, link, new_a, new_b).await;
        self.ctx.finish(tx, result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mirror(&self, a: &ObjectRef, b: &ObjectRef) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result = self.mirror_in(&mut tx, a, b).await;
        self.ctx.finish(tx, result).await
    }

    /// Remove every mirror edge of `port`, whichever side created it.
    #[tracing::instrument(skip(self))]
    pub async fn release_mirror(&self, port: &ObjectRef) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<()> = async {
            self.ctx.require(&tx, port).await?;
            for edge in self.mirror_edges(&tx, port).await? {
                self.ctx.store.delete_edge(&mut tx, edge.id).await?;
            }
            Ok(())
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Release all edges of the connection and delete it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_connection(&self, link: &ObjectRef) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<()> = async {
            self.require_connection(&tx, link).await?;
            self.ensure_no_dependents(&tx, link).await?;
            self.ctx.store.detach_delete_object(&mut tx, link).await?;
            Ok(())
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    // ========================================================================
    // Transaction-scoped operations
    // ========================================================================

    pub(crate) async fn physical_path_in(&self, tx: &S::Tx, port: &ObjectRef) -> Result<Vec<ObjectRef>> {
        self.ctx.require(tx, port).await?;
        let mut path = vec![port.clone()];
        let mut visited: HashSet<ObjectRef> = HashSet::new();
        visited.insert(port.clone());
        let mut current = port.clone();

        loop {
            if path.len() > self.ctx.config.max_traversal_depth {
                tracing::error!(port = %port, depth = path.len(), "physical path exceeded depth limit");
                return Err(Error::CycleDetected(format!(
                    "Physical path from {port} is longer than {}",
                    self.ctx.config.max_traversal_depth
                )));
            }

            let mirror_peer = self.mirror_edges(tx, &current).await?
                .into_iter()
                .filter_map(|e| e.other_end(&current).cloned())
                .find(|peer| !visited.contains(peer));
            if let Some(peer) = mirror_peer {
                visited.insert(peer.clone());
                path.push(peer.clone());
                current = peer;
                continue;
            }

            let link = self.attached_links(tx, &current).await?
                .into_iter()
                .find(|l| !visited.contains(l));
            let Some(link) = link else { break };
            visited.insert(link.clone());
            path.push(link.clone());

            let far_end = self.ctx.store
                .get_edges(tx, &link, Direction::Outgoing, Some(EdgeKind::RelatedTo), None)
                .await?
                .into_iter()
                .filter(|e| self.is_endpoint_edge(e) && e.dst != current)
                .map(|e| e.dst)
                .next();
            match far_end {
                Some(next) if !visited.contains(&next) => {
                    visited.insert(next.clone());
                    path.push(next.clone());
                    current = next;
                }
                _ => break,
            }
        }
        tracing::debug!(port = %port, hops = path.len(), "physical path traced");
        Ok(path)
    }

    async fn physical_tree_in(&self, tx: &S::Tx, port: &ObjectRef) -> Result<Vec<(ObjectRef, Vec<ObjectRef>)>> {
        self.ctx.require(tx, port).await?;
        let mut tree = Vec::new();
        let mut visited: HashSet<ObjectRef> = HashSet::new();
        visited.insert(port.clone());
        let mut queue: VecDeque<(ObjectRef, usize)> = VecDeque::new();
        queue.push_back((port.clone(), 0));

        while let Some((node, level)) = queue.pop_front() {
            if level > self.ctx.config.max_traversal_depth {
                tracing::error!(port = %port, level, "physical tree exceeded depth limit");
                return Err(Error::CycleDetected(format!("Physical tree from {port} is too deep")));
            }
            let mut next = Vec::new();
            let edges = self.ctx.store
                .get_edges(tx, &node, Direction::Both, Some(EdgeKind::RelatedTo), None)
                .await?;
            for edge in edges.iter().filter(|e| self.is_endpoint_edge(e) || is_mirror_edge(e)) {
                if let Some(other) = edge.other_end(&node)
                    && visited.insert(other.clone())
                {
                    next.push(other.clone());
                    queue.push_back((other.clone(), level + 1));
                }
            }
            tree.push((node, next));
        }
        Ok(tree)
    }

    pub(crate) async fn endpoints_in(
        &self,
        tx: &S::Tx,
        link: &ObjectRef,
    ) -> Result<(Option<ObjectRef>, Option<ObjectRef>)> {
        let mut ends = [None, None];
        for (slot, label) in ends.iter_mut().zip(self.family.endpoint_labels()) {
            *slot = self.ctx.store
                .get_edges(tx, link, Direction::Outgoing, Some(EdgeKind::RelatedTo), Some(label))
                .await?
                .into_iter()
                .next()
                .map(|e| e.dst);
        }
        let [a, b] = ends;
        Ok((a, b))
    }

    pub(crate) async fn connect_in(
        &self,
        tx: &mut S::Tx,
        a: &ObjectRef,
        b: &ObjectRef,
        link_class: &str,
        link_id: Option<&str>,
        name: &str,
    ) -> Result<ObjectRef> {
        let descriptor = self.ctx.classes.get_class(link_class)?;
        if !self.ctx.classes.is_subclass_of(link_class, self.family.base_class())? {
            return Err(Error::InvalidArgument(format!(
                "{link_class} is not a subclass of {}",
                self.family.base_class()
            )));
        }
        if a == b {
            return Err(Error::InvalidArgument(format!("{a} can not be connected to itself")));
        }
        self.ctx.require(tx, a).await?;
        self.ctx.require(tx, b).await?;

        let is_container = self.is_container_class(link_class)?;
        for end in [a, b] {
            self.claim_end(tx, end, is_container).await?;
        }

        let link = match link_id {
            Some(id) => {
                let link = ObjectRef::new(link_class, id);
                self.ctx.require(tx, &link).await?;
                let (ea, eb) = self.endpoints_in(tx, &link).await?;
                if ea.is_some() || eb.is_some() {
                    return Err(Error::BusinessConstraintViolation(format!(
                        "{link} already has endpoints"
                    )));
                }
                self.ctx.store.guard(tx, EdgeGuard::absent(
                    link.clone(),
                    Direction::Outgoing,
                    EdgeKind::RelatedTo,
                    &self.family.endpoint_labels(),
                    format!("{link} was connected concurrently"),
                )).await?;
                link
            }
            None => {
                if descriptor.is_abstract {
                    return Err(Error::InvalidArgument(format!("{link_class} is abstract")));
                }
                self.create_link(tx, a, b, link_class, name).await?
            }
        };

        for (label, end) in self.family.endpoint_labels().into_iter().zip([a, b]) {
            self.ctx.store
                .put_edge(tx, EdgeKind::RelatedTo, Some(label), &link, end, PropertyMap::new())
                .await?;
        }
        tracing::debug!(link = %link, a = %a, b = %b, family = ?self.family, "connection created");
        Ok(link)
    }

    pub(crate) async fn disconnect_in(&self, tx: &mut S::Tx, link: &ObjectRef, side: Side) -> Result<()> {
        self.require_connection(tx, link).await?;
        if side == Side::Both {
            self.ensure_no_dependents(tx, link).await?;
        }
        for label in side.labels(self.family) {
            let edges = self.ctx.store
                .get_edges(tx, link, Direction::Outgoing, Some(EdgeKind::RelatedTo), Some(label))
                .await?;
            for edge in edges {
                self.ctx.store.delete_edge(tx, edge.id).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn reconnect_in(
        &self,
        tx: &mut S::Tx,
        link: &ObjectRef,
        new_a: Option<&ObjectRef>,
        new_b: Option<&ObjectRef>,
    ) -> Result<()> {
        self.require_connection(tx, link).await?;
        let is_container = self.is_container_class(&link.class_name)?;
        let (cur_a, cur_b) = self.endpoints_in(tx, link).await?;

        let final_a = new_a.or(cur_a.as_ref());
        let final_b = new_b.or(cur_b.as_ref());
        if let (Some(x), Some(y)) = (final_a, final_b)
            && x == y
        {
            return Err(Error::InvalidArgument(format!("{link} can not have {x} at both ends")));
        }

        let sides = [
            (self.family.endpoint_a(), new_a, cur_a.as_ref()),
            (self.family.endpoint_b(), new_b, cur_b.as_ref()),
        ];
        for (label, new_end, current) in sides {
            let Some(new_end) = new_end else { continue };
            if Some(new_end) == current {
                continue;
            }
            self.ctx.require(tx, new_end).await?;
            self.claim_end(tx, new_end, is_container).await?;

            let old = self.ctx.store
                .get_edges(tx, link, Direction::Outgoing, Some(EdgeKind::RelatedTo), Some(label))
                .await?;
            for edge in old {
                self.ctx.store.delete_edge(tx, edge.id).await?;
            }
            self.ctx.store
                .put_edge(tx, EdgeKind::RelatedTo, Some(label), link, new_end, PropertyMap::new())
                .await?;
        }
        Ok(())
    }

    async fn mirror_in(&self, tx: &mut S::Tx, a: &ObjectRef, b: &ObjectRef) -> Result<()> {
        if a == b {
            return Err(Error::InvalidArgument(format!("{a} can not mirror itself")));
        }
        let endpoint_labels = ConnectionFamily::Physical.endpoint_labels();
        for port in [a, b] {
            self.ctx.require(tx, port).await?;
            if !self.ctx.is_a(port, schema::GENERIC_PORT)? {
                return Err(Error::InvalidArgument(format!("{port} is not a port")));
            }
            if !self.mirror_edges(tx, port).await?.is_empty() {
                return Err(Error::BusinessConstraintViolation(format!("{port} already has a mirror")));
            }
            let endpoint = self.ctx.store
                .get_edges(tx, port, Direction::Incoming, Some(EdgeKind::RelatedTo), None)
                .await?
                .into_iter()
                .any(|e| e.label.as_deref().is_some_and(|l| endpoint_labels.contains(&l)));
            if endpoint {
                return Err(Error::BusinessConstraintViolation(format!(
                    "{port} is a link endpoint and can not be mirrored"
                )));
            }
            self.ctx.store.guard(tx, EdgeGuard::absent(
                port.clone(),
                Direction::Both,
                EdgeKind::RelatedTo,
                &MIRROR_LABELS,
                format!("{port} was mirrored concurrently"),
            )).await?;
            self.ctx.store.guard(tx, EdgeGuard::absent(
                port.clone(),
                Direction::Incoming,
                EdgeKind::RelatedTo,
                &endpoint_labels,
                format!("{port} was connected concurrently"),
            )).await?;
        }
        self.ctx.store
            .put_edge(tx, EdgeKind::RelatedTo, Some(MIRROR), a, b, PropertyMap::new())
            .await?;
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn is_endpoint_edge(&self, edge: &Edge) -> bool {
        edge.label
            .as_deref()
            .is_some_and(|l| self.family.endpoint_labels().contains(&l))
    }

    fn is_container_class(&self, class: &str) -> Result<bool> {
        Ok(self.family == ConnectionFamily::Physical
            && self.ctx.classes.is_subclass_of(class, schema::GENERIC_PHYSICAL_CONTAINER)?)
    }

    fn is_port(&self, obj: &ObjectRef) -> Result<bool> {
        self.ctx.is_any_of(obj, &self.family.port_classes())
    }

    /// Links whose endpoint edges point at `port`.
    async fn attached_links(&self, tx: &S::Tx, port: &ObjectRef) -> Result<Vec<ObjectRef>> {
        Ok(self.ctx.store
            .get_edges(tx, port, Direction::Incoming, Some(EdgeKind::RelatedTo), None)
            .await?
            .into_iter()
            .filter(|e| self.is_endpoint_edge(e))
            .map(|e| e.src)
            .collect())
    }

    async fn mirror_edges(&self, tx: &S::Tx, port: &ObjectRef) -> Result<Vec<Edge>> {
        Ok(self.ctx.store
            .get_edges(tx, port, Direction::Both, Some(EdgeKind::RelatedTo), None)
            .await?
            .into_iter()
            .filter(is_mirror_edge)
            .collect())
    }

    /// Validate an end before attaching a connection to it. Ports must be
    /// free now and are guarded until commit. Containers may also end at
    /// non-port objects, which accept any number of connections.
    async fn claim_end(&self, tx: &mut S::Tx, end: &ObjectRef, is_container: bool) -> Result<()> {
        if !self.is_port(end)? {
            if is_container {
                return Ok(());
            }
            return Err(Error::InvalidArgument(format!("{end} is not a port")));
        }
        if !self.attached_links(tx, end).await?.is_empty() {
            return Err(Error::BusinessConstraintViolation(format!("{end} is already connected")));
        }
        if !self.mirror_edges(tx, end).await?.is_empty() {
            return Err(Error::BusinessConstraintViolation(format!("{end} is mirrored")));
        }
        self.ctx.store.guard(tx, EdgeGuard::absent(
            end.clone(),
            Direction::Incoming,
            EdgeKind::RelatedTo,
            &self.family.endpoint_labels(),
            format!("{end} was connected concurrently"),
        )).await?;
        self.ctx.store.guard(tx, EdgeGuard::absent(
            end.clone(),
            Direction::Both,
            EdgeKind::RelatedTo,
            &MIRROR_LABELS,
            format!("{end} was mirrored concurrently"),
        )).await
    }

    /// New link hung under the common ancestor of its ends (physical), or
    /// under the root (MPLS).
    async fn create_link(
        &self,
        tx: &mut S::Tx,
        a: &ObjectRef,
        b: &ObjectRef,
        link_class: &str,
        name: &str,
    ) -> Result<ObjectRef> {
        let parent = match self.family {
            ConnectionFamily::Physical => {
                let parent = HierarchyResolver::new(self.ctx).common_ancestor_in(tx, a, b).await?;
                if parent.is_root() {
                    return Err(Error::BusinessConstraintViolation(format!(
                        "{a} and {b} have no common parent"
                    )));
                }
                Some(parent)
            }
            ConnectionFamily::Mpls => None,
        };
        let link = self.ctx.store.create_object(tx, link_class, name, AttributeMap::new()).await?;
        if let Some(parent) = parent {
            self.ctx.store
                .put_edge(tx, EdgeKind::ChildOfSpecial, None, &link, &parent, PropertyMap::new())
                .await?;
        }
        Ok(link)
    }

    async fn require_connection(&self, tx: &S::Tx, link: &ObjectRef) -> Result<()> {
        self.ctx.require(tx, link).await?;
        if !self.ctx.is_a(link, self.family.base_class())? {
            return Err(Error::InvalidArgument(format!(
                "{link} is not a {}",
                self.family.base_class()
            )));
        }
        Ok(())
    }

    /// A container can not lose both ends while connections nested in it
    /// still have endpoints.
    async fn ensure_no_dependents(&self, tx: &S::Tx, link: &ObjectRef) -> Result<()> {
        if !self.is_container_class(&link.class_name)? {
            return Ok(());
        }
        let children = HierarchyResolver::new(self.ctx)
            .children_in(tx, link, EdgeKind::ChildOfSpecial)
            .await?;
        for child in children {
            let connected = self.ctx.store
                .get_edges(tx, &child, Direction::Outgoing, Some(EdgeKind::RelatedTo), None)
                .await?
                .iter()
                .any(|e| self.is_endpoint_edge(e));
            if connected {
                return Err(Error::HasDependentConnections(format!(
                    "{child} inside {link} is still connected"
                )));
            }
        }
        Ok(())
    }
}

fn is_mirror_edge(edge: &Edge) -> bool {
    edge.label.as_deref().is_some_and(|l| MIRROR_LABELS.contains(&l))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Inventory;

    #[test]
    fn test_family_labels() {
        assert_eq!(ConnectionFamily::Mpls.endpoint_labels(), ["mplsEndpointA", "mplsEndpointB"]);
        assert_eq!(Side::Both.labels(ConnectionFamily::Physical).as_slice(), ["endpointA", "endpointB"]);
        assert_eq!(Side::B.labels(ConnectionFamily::Physical).as_slice(), ["endpointB"]);
        assert!(ConnectionFamily::Mpls.port_classes().contains(&"VRFInstance"));
    }

    #[tokio::test]
    async fn test_unconnected_port_path() {
        let inv = Inventory::open_memory();
        let store = inv.store();
        let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
        let port = store.create_object(&mut tx, "OpticalPort", "p", AttributeMap::new()).await.unwrap();
        store.commit_tx(tx).await.unwrap();

        assert_eq!(inv.physical().physical_path(&port).await.unwrap(), vec![port.clone()]);
        assert_eq!(inv.physical().physical_tree(&port).await.unwrap(), vec![(port.clone(), Vec::<ObjectRef>::new())]);
        assert_eq!(inv.physical().link_connected_to_port(&port).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connect_rejects_non_port_for_links() {
        let inv = Inventory::open_memory();
        let store = inv.store();
        let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
        let rack = store.create_object(&mut tx, "Rack", "r", AttributeMap::new()).await.unwrap();
        let a = store.create_object(&mut tx, "Router", "a", AttributeMap::new()).await.unwrap();
        let b = store.create_object(&mut tx, "Router", "b", AttributeMap::new()).await.unwrap();
        for child in [&a, &b] {
            store.put_edge(&mut tx, EdgeKind::ChildOf, None, child, &rack, PropertyMap::new()).await.unwrap();
        }
        store.commit_tx(tx).await.unwrap();

        let physical = inv.physical();
        let link = physical.connect(&a, &b, "OpticalLink", None, "l").await;
        assert!(matches!(link, Err(Error::InvalidArgument(_))));

        // Containers may run between equipment.
        let container = physical.connect(&a, &b, "WireContainer", None, "c").await.unwrap();
        assert_eq!(physical.endpoints(&container).await.unwrap(), (Some(a), Some(b)));
    }

    #[tokio::test]
    async fn test_connect_rejects_foreign_class() {
        let inv = Inventory::open_memory();
        let store = inv.store();
        let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
        let a = store.create_object(&mut tx, "OpticalPort", "a", AttributeMap::new()).await.unwrap();
        let b = store.create_object(&mut tx, "OpticalPort", "b", AttributeMap::new()).await.unwrap();
        store.commit_tx(tx).await.unwrap();

        let result = inv.physical().connect(&a, &b, "STM16", None, "l").await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        let result = inv.physical().connect(&a, &a, "OpticalLink", None, "l").await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
