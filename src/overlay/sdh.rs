//! SDH multiplexing: transport links carry containers, high-order
//! containers carry low-order ones, and containers deliver tributary links.
//!
//! ```text
//! transport ──sdhTransports{sdhPosition}──▶ container ──sdhDelivers──▶ tributary
//! high-order container ──sdhContains{sdhPosition}──▶ low-order container
//! ```
//!
//! A container holds the same positions on every carrier along its route.

use hashbrown::HashSet;

use super::OverlayResolver;
use crate::hierarchy::HierarchyResolver;
use crate::model::*;
use crate::schema::{self, ClassHierarchy};
use crate::storage::ObjectStore;
use crate::tx::{EdgeGuard, TxMode};
use crate::{Error, Result};

pub const SDH_TRANSPORT_LINK: &str = "sdhTransportLink";
pub const SDH_CONTAINER_LINK: &str = "sdhContainerLink";
pub const SDH_TRANSPORTS: &str = "sdhTransports";
pub const SDH_CONTAINS: &str = "sdhContains";
pub const SDH_DELIVERS: &str = "sdhDelivers";
pub const SDH_TL_ENDPOINT_A: &str = "sdhTLEndpointA";
pub const SDH_TL_ENDPOINT_B: &str = "sdhTLEndpointB";
pub const SDH_TTL_ENDPOINT_A: &str = "sdhTTLEndpointA";
pub const SDH_TTL_ENDPOINT_B: &str = "sdhTTLEndpointB";

const TRIBUTARY_SUFFIX: &str = "TributaryLink";

/// Number of STM-1 equivalents in a transport link class, e.g. `STM16` is 16.
pub fn transport_link_capacity(class_name: &str) -> Option<u32> {
    class_name
        .strip_prefix("STM")?
        .parse()
        .ok()
        .filter(|n| *n > 0)
}

/// Number of VC4 slots a container class takes: `VC4` is 1, `VC4-04` is 4.
pub fn container_link_capacity(class_name: &str) -> Option<u32> {
    if class_name == "VC4" {
        return Some(1);
    }
    class_name
        .strip_prefix("VC4-")?
        .parse()
        .ok()
        .filter(|n| *n > 0)
}

impl<'a, S: ObjectStore, C: ClassHierarchy> OverlayResolver<'a, S, C> {
    // ========================================================================
    // Structure queries
    // ========================================================================

    /// Containers multiplexed onto a transport link with their positions.
    #[tracing::instrument(skip(self))]
    pub async fn container_link_structure(&self, transport_link: &ObjectRef) -> Result<Vec<ContainerPositionEntry>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result: Result<Vec<ContainerPositionEntry>> = async {
            self.require_class(&tx, transport_link, schema::GENERIC_SDH_TRANSPORT_LINK).await?;
            let mut entries = Vec::new();
            for (container, positions) in self.carried_in(&tx, transport_link, SDH_TRANSPORTS).await? {
                let delivers = self.ctx.store
                    .has_edge(&tx, &container, Direction::Outgoing, EdgeKind::RelatedTo, Some(SDH_DELIVERS))
                    .await?;
                entries.push(ContainerPositionEntry {
                    container,
                    structured: !delivers,
                    carrier: transport_link.clone(),
                    positions,
                });
            }
            Ok(entries)
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Low-order containers inside a high-order container with their
    /// positions.
    #[tracing::instrument(skip(self))]
    pub async fn high_order_container_structure(&self, container_link: &ObjectRef) -> Result<Vec<ContainerPositionEntry>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result: Result<Vec<ContainerPositionEntry>> = async {
            self.require_class(&tx, container_link, schema::GENERIC_SDH_HIGH_ORDER_CONTAINER_LINK).await?;
            let mut entries = Vec::new();
            for (container, positions) in self.carried_in(&tx, container_link, SDH_CONTAINS).await? {
                let nested = self.ctx.store
                    .has_edge(&tx, &container, Direction::Outgoing, EdgeKind::RelatedTo, Some(SDH_CONTAINS))
                    .await?;
                entries.push(ContainerPositionEntry {
                    container,
                    structured: nested,
                    carrier: container_link.clone(),
                    positions,
                });
            }
            Ok(entries)
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Every carrier segment of a container link with the positions taken
    /// on it.
    #[tracing::instrument(skip(self))]
    pub async fn container_link_segments(&self, container_link: &ObjectRef) -> Result<Vec<(ObjectRef, Vec<u32>)>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.segments_in(&tx, container_link).await;
        self.ctx.finish(tx, result).await
    }

    /// The position set shared by every segment of the container link.
    /// Fails if two segments disagree or a segment is over capacity.
    #[tracing::instrument(skip(self))]
    pub async fn check_container_positions(&self, container_link: &ObjectRef) -> Result<Vec<u32>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result: Result<Vec<u32>> = async {
            let segments = self.segments_in(&tx, container_link).await?;
            for (segment, positions) in &segments {
                check_capacity(&container_link.class_name, segment, positions)?;
            }
            let mut iter = segments.into_iter();
            let Some((first, expected)) = iter.next() else { return Ok(Vec::new()) };
            for (segment, positions) in iter {
                if positions != expected {
                    return Err(Error::InvalidArgument(format!(
                        "{container_link} takes {positions:?} on {segment} but {expected:?} on {first}"
                    )));
                }
            }
            Ok(expected)
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    // ========================================================================
    // Provisioning
    // ========================================================================

    /// New transport link between two ports, joined in the overlay to the
    /// equipment holding each port.
    #[tracing::instrument(skip(self))]
    pub async fn create_transport_link(
        &self,
        port_a: &ObjectRef,
        port_b: &ObjectRef,
        class_name: &str,
        name: &str,
    ) -> Result<ObjectRef> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<ObjectRef> = async {
            self.require_concrete(class_name, schema::GENERIC_SDH_TRANSPORT_LINK)?;
            let (equip_a, equip_b) = self.port_equipment(&tx, port_a, port_b).await?;
            for port in [port_a, port_b] {
                let taken = self.ctx.store
                    .get_edges(&tx, port, Direction::Incoming, Some(EdgeKind::RelatedTo), None)
                    .await?
                    .iter()
                    .any(|e| e.has_label(SDH_TL_ENDPOINT_A) || e.has_label(SDH_TL_ENDPOINT_B));
                if taken {
                    return Err(Error::BusinessConstraintViolation(format!(
                        "{port} already terminates a transport link"
                    )));
                }
                self.ctx.store.guard(&mut tx, EdgeGuard::absent(
                    port.clone(),
                    Direction::Incoming,
                    EdgeKind::RelatedTo,
                    &[SDH_TL_ENDPOINT_A, SDH_TL_ENDPOINT_B],
                    format!("{port} was given a transport link concurrently"),
                )).await?;
            }

            let link = self.ctx.store.create_object(&mut tx, class_name, name, AttributeMap::new()).await?;
            self.relate(&mut tx, SDH_TL_ENDPOINT_A, &link, port_a).await?;
            self.relate(&mut tx, SDH_TL_ENDPOINT_B, &link, port_b).await?;
            self.relate(&mut tx, SDH_TRANSPORT_LINK, &equip_a, &link).await?;
            self.relate(&mut tx, SDH_TRANSPORT_LINK, &link, &equip_b).await?;
            Ok(link)
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// New container link between two pieces of equipment, taking
    /// `positions` on every one of `segments`.
    #[tracing::instrument(skip(self))]
    pub async fn create_container_link(
        &self,
        equip_a: &ObjectRef,
        equip_b: &ObjectRef,
        class_name: &str,
        segments: &[ObjectRef],
        positions: &[u32],
        name: &str,
    ) -> Result<ObjectRef> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<ObjectRef> = async {
            for equipment in [equip_a, equip_b] {
                self.require_equipment(&tx, equipment).await?;
            }
            self.create_container_in(&mut tx, equip_a, equip_b, class_name, segments, positions, name).await
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// New tributary link between two ports plus the container delivering
    /// it. Returns `(tributary, container)`.
    #[tracing::instrument(skip(self))]
    pub async fn create_tributary_link(
        &self,
        port_a: &ObjectRef,
        port_b: &ObjectRef,
        class_name: &str,
        segments: &[ObjectRef],
        positions: &[u32],
        name: &str,
    ) -> Result<(ObjectRef, ObjectRef)> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<(ObjectRef, ObjectRef)> = async {
            self.require_concrete(class_name, schema::GENERIC_SDH_TRIBUTARY_LINK)?;
            let container_class = class_name.strip_suffix(TRIBUTARY_SUFFIX).ok_or_else(|| {
                Error::InvalidArgument(format!("{class_name} does not name its container class"))
            })?;
            let (equip_a, equip_b) = self.port_equipment(&tx, port_a, port_b).await?;

            let container = self
                .create_container_in(&mut tx, &equip_a, &equip_b, container_class, segments, positions, name)
                .await?;
            let tributary = self.ctx.store.create_object(&mut tx, class_name, name, AttributeMap::new()).await?;
            self.relate(&mut tx, SDH_TTL_ENDPOINT_A, &tributary, port_a).await?;
            self.relate(&mut tx, SDH_TTL_ENDPOINT_B, &tributary, port_b).await?;
            self.relate(&mut tx, SDH_DELIVERS, &container, &tributary).await?;
            Ok((tributary, container))
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Delete a transport link and every container riding on it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_transport_link(&self, transport_link: &ObjectRef) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<()> = async {
            self.require_class(&tx, transport_link, schema::GENERIC_SDH_TRANSPORT_LINK).await?;
            let containers: Vec<ObjectRef> = self.carried_in(&tx, transport_link, SDH_TRANSPORTS).await?
                .into_iter()
                .map(|(c, _)| c)
                .collect();
            self.delete_containers_in(&mut tx, containers).await?;
            self.ctx.store.detach_delete_object(&mut tx, transport_link).await?;
            Ok(())
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Delete a container link, the tributaries it delivers and the
    /// containers nested in it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_container_link(&self, container_link: &ObjectRef) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<()> = async {
            self.require_class(&tx, container_link, schema::GENERIC_SDH_CONTAINER_LINK).await?;
            self.delete_containers_in(&mut tx, vec![container_link.clone()]).await
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Delete a tributary link together with its delivering container.
    #[tracing::instrument(skip(self))]
    pub async fn delete_tributary_link(&self, tributary_link: &ObjectRef) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<()> = async {
            self.require_class(&tx, tributary_link, schema::GENERIC_SDH_TRIBUTARY_LINK).await?;
            let delivering: Vec<ObjectRef> = self.ctx.store
                .get_edges(&tx, tributary_link, Direction::Incoming, Some(EdgeKind::RelatedTo), Some(SDH_DELIVERS))
                .await?
                .into_iter()
                .map(|e| e.src)
                .collect();
            self.delete_containers_in(&mut tx, delivering).await?;
            if self.ctx.store.exists(&tx, tributary_link).await? {
                self.ctx.store.detach_delete_object(&mut tx, tributary_link).await?;
            }
            Ok(())
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// What `carrier` carries over `label`, grouped per container with
    /// sorted positions, ordered by first position.
    async fn carried_in(&self, tx: &S::Tx, carrier: &ObjectRef, label: &str) -> Result<Vec<(ObjectRef, Vec<u32>)>> {
        let edges = self.ctx.store
            .get_edges(tx, carrier, Direction::Outgoing, Some(EdgeKind::RelatedTo), Some(label))
            .await?;
        let mut grouped = group_positions(edges.iter().map(|e| (e.dst.clone(), e)))?;
        grouped.sort_by_key(|(_, positions)| positions.first().copied());
        Ok(grouped)
    }

    async fn segments_in(&self, tx: &S::Tx, container_link: &ObjectRef) -> Result<Vec<(ObjectRef, Vec<u32>)>> {
        self.require_class(tx, container_link, schema::GENERIC_SDH_CONTAINER_LINK).await?;
        let (label, _) = self.carrier_of(&container_link.class_name)?;
        let edges = self.ctx.store
            .get_edges(tx, container_link, Direction::Incoming, Some(EdgeKind::RelatedTo), Some(label))
            .await?;
        group_positions(edges.iter().map(|e| (e.src.clone(), e)))
    }

    /// Carrier edge label and carrier class for a container class.
    fn carrier_of(&self, container_class: &str) -> Result<(&'static str, &'static str)> {
        let classes = self.ctx.classes;
        if classes.is_subclass_of(container_class, schema::GENERIC_SDH_HIGH_ORDER_CONTAINER_LINK)? {
            Ok((SDH_TRANSPORTS, schema::GENERIC_SDH_TRANSPORT_LINK))
        } else if classes.is_subclass_of(container_class, schema::GENERIC_SDH_LOW_ORDER_CONTAINER_LINK)? {
            Ok((SDH_CONTAINS, schema::GENERIC_SDH_HIGH_ORDER_CONTAINER_LINK))
        } else {
            Err(Error::InvalidArgument(format!("{container_class} is not an SDH container link class")))
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_container_in(
        &self,
        tx: &mut S::Tx,
        equip_a: &ObjectRef,
        equip_b: &ObjectRef,
        class_name: &str,
        segments: &[ObjectRef],
        positions: &[u32],
        name: &str,
    ) -> Result<ObjectRef> {
        self.require_concrete(class_name, schema::GENERIC_SDH_CONTAINER_LINK)?;
        let (label, carrier_class) = self.carrier_of(class_name)?;
        if equip_a == equip_b {
            return Err(Error::InvalidArgument(format!("{equip_a} can not be linked to itself")));
        }
        validate_positions(positions)?;
        if segments.is_empty() {
            return Err(Error::InvalidArgument("A container link needs at least one segment".into()));
        }

        let mut seen: HashSet<&ObjectRef> = HashSet::new();
        for segment in segments {
            if !seen.insert(segment) {
                return Err(Error::InvalidArgument(format!("Segment {segment} is listed twice")));
            }
            self.require_class(tx, segment, carrier_class).await?;
            let occupied: HashSet<u32> = self.carried_in(tx, segment, label).await?
                .into_iter()
                .flat_map(|(_, p)| p)
                .collect();
            if let Some(clash) = positions.iter().find(|p| occupied.contains(*p)) {
                return Err(Error::BusinessConstraintViolation(format!(
                    "Position {clash} on {segment} is already in use"
                )));
            }
            check_capacity(class_name, segment, positions)?;
            for position in positions {
                self.ctx.store.guard(tx, EdgeGuard::absent(
                    segment.clone(),
                    Direction::Outgoing,
                    EdgeKind::RelatedTo,
                    &[label],
                    format!("Position {position} on {segment} was taken concurrently"),
                ).with_property(SDH_POSITION, *position)).await?;
            }
        }

        let container = self.ctx.store.create_object(tx, class_name, name, AttributeMap::new()).await?;
        self.relate(tx, SDH_CONTAINER_LINK, equip_a, &container).await?;
        self.relate(tx, SDH_CONTAINER_LINK, &container, equip_b).await?;
        for segment in segments {
            for position in positions {
                let mut props = PropertyMap::new();
                props.insert(SDH_POSITION.to_owned(), Value::from(*position));
                self.ctx.store
                    .put_edge(tx, EdgeKind::RelatedTo, Some(label), segment, &container, props)
                    .await?;
            }
        }
        tracing::debug!(container = %container, segments = segments.len(), positions = positions.len(), "container link created");
        Ok(container)
    }

    /// Delete containers, their nested containers and everything they
    /// deliver.
    async fn delete_containers_in(&self, tx: &mut S::Tx, roots: Vec<ObjectRef>) -> Result<()> {
        let mut doomed = Vec::new();
        let mut visited: HashSet<ObjectRef> = HashSet::new();
        let mut stack = roots;
        while let Some(container) = stack.pop() {
            if !visited.insert(container.clone()) {
                continue;
            }
            let nested = self.ctx.store
                .get_edges(tx, &container, Direction::Outgoing, Some(EdgeKind::RelatedTo), Some(SDH_CONTAINS))
                .await?;
            stack.extend(nested.into_iter().map(|e| e.dst));
            doomed.push(container);
        }

        for container in &doomed {
            let delivered = self.ctx.store
                .get_edges(tx, container, Direction::Outgoing, Some(EdgeKind::RelatedTo), Some(SDH_DELIVERS))
                .await?;
            for edge in delivered {
                self.ctx.store.detach_delete_object(tx, &edge.dst).await?;
            }
            self.ctx.store.detach_delete_object(tx, container).await?;
        }
        tracing::debug!(deleted = doomed.len(), "container links deleted");
        Ok(())
    }

    /// Equipment holding each of two distinct ports.
    async fn port_equipment(&self, tx: &S::Tx, port_a: &ObjectRef, port_b: &ObjectRef) -> Result<(ObjectRef, ObjectRef)> {
        if port_a == port_b {
            return Err(Error::InvalidArgument(format!("{port_a} can not be linked to itself")));
        }
        self.require_class(tx, port_a, schema::GENERIC_PORT).await?;
        self.require_class(tx, port_b, schema::GENERIC_PORT).await?;
        Ok((self.equipment_of(tx, port_a).await?, self.equipment_of(tx, port_b).await?))
    }

    /// First communications element above `obj`. `NotFound` when the walk
    /// falls back to the root.
    pub(super) async fn equipment_of(&self, tx: &S::Tx, obj: &ObjectRef) -> Result<ObjectRef> {
        let equipment = HierarchyResolver::new(self.ctx)
            .first_ancestor_of_class_in(tx, obj, schema::GENERIC_COMMUNICATIONS_ELEMENT)
            .await?;
        if equipment.is_root() {
            return Err(Error::NotFound(format!("Equipment holding {obj}")));
        }
        Ok(equipment)
    }

    pub(super) async fn require_class(&self, tx: &S::Tx, obj: &ObjectRef, class: &str) -> Result<()> {
        self.ctx.require(tx, obj).await?;
        if !self.ctx.is_a(obj, class)? {
            return Err(Error::InvalidArgument(format!("{obj} is not a {class}")));
        }
        Ok(())
    }

    fn require_concrete(&self, class_name: &str, family: &str) -> Result<()> {
        let descriptor = self.ctx.classes.get_class(class_name)?;
        if !self.ctx.classes.is_subclass_of(class_name, family)? {
            return Err(Error::InvalidArgument(format!("{class_name} is not a {family}")));
        }
        if descriptor.is_abstract {
            return Err(Error::InvalidArgument(format!("{class_name} is abstract")));
        }
        Ok(())
    }

    pub(super) async fn relate(&self, tx: &mut S::Tx, label: &str, src: &ObjectRef, dst: &ObjectRef) -> Result<EdgeId> {
        self.ctx.store
            .put_edge(tx, EdgeKind::RelatedTo, Some(label), src, dst, PropertyMap::new())
            .await
    }
}

/// Non-empty, no zeros, no duplicates.
fn validate_positions(positions: &[u32]) -> Result<()> {
    if positions.is_empty() {
        return Err(Error::InvalidArgument("Position list is empty".into()));
    }
    if positions.contains(&0) {
        return Err(Error::InvalidArgument("Positions start at 1".into()));
    }
    let unique: HashSet<u32> = positions.iter().copied().collect();
    if unique.len() != positions.len() {
        return Err(Error::InvalidArgument(format!("Duplicate positions in {positions:?}")));
    }
    Ok(())
}

/// On a transport carrier, positions fit its STM-N slots and a concatenated
/// container takes no more slots than its width.
fn check_capacity(container_class: &str, carrier: &ObjectRef, positions: &[u32]) -> Result<()> {
    let Some(slots) = transport_link_capacity(&carrier.class_name) else { return Ok(()) };
    if let Some(width) = container_link_capacity(container_class)
        && positions.len() > width as usize
    {
        return Err(Error::InvalidArgument(format!(
            "{container_class} takes at most {width} positions, got {}",
            positions.len()
        )));
    }
    if let Some(beyond) = positions.iter().find(|p| **p > slots) {
        return Err(Error::InvalidArgument(format!(
            "Position {beyond} is beyond the {slots} slots of {carrier}"
        )));
    }
    Ok(())
}

fn edge_position(edge: &Edge) -> Result<u32> {
    edge.properties
        .get(SDH_POSITION)
        .and_then(Value::as_int)
        .and_then(|p| u32::try_from(p).ok())
        .ok_or_else(|| Error::InvalidArgument(format!(
            "Edge {} from {} to {} has no valid {SDH_POSITION}",
            edge.id, edge.src, edge.dst
        )))
}

/// Group `(key, edge)` pairs by key in first-seen order, positions sorted.
fn group_positions<'e>(pairs: impl Iterator<Item = (ObjectRef, &'e Edge)>) -> Result<Vec<(ObjectRef, Vec<u32>)>> {
    let mut grouped: Vec<(ObjectRef, Vec<u32>)> = Vec::new();
    for (key, edge) in pairs {
        let position = edge_position(edge)?;
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, positions)) => positions.push(position),
            None => grouped.push((key, vec![position])),
        }
    }
    for (_, positions) in &mut grouped {
        positions.sort_unstable();
    }
    Ok(grouped)
}
