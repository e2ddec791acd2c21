//! # Overlay Route Resolver
//!
//! Route search over graphs derived from labeled edges between equipment
//! and the links that join them:
//!
//! ```text
//! equipmentA ──label──▶ link ──label──▶ equipmentB
//! ```
//!
//! One overlay per [`OverlayKind`]. Searches are breadth-first and treat
//! every link as one hop. SDH provisioning lives in [`sdh`], MPLS in
//! [`mpls`].

pub mod sdh;
pub mod mpls;

pub use mpls::{MplsLinkDetails, MPLS_LINK_LABEL};
pub use sdh::{container_link_capacity, transport_link_capacity};

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::context::Ctx;
use crate::model::*;
use crate::schema::{self, ClassHierarchy};
use crate::storage::ObjectStore;
use crate::tx::TxMode;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayKind {
    SdhTransport,
    SdhContainer,
    Mpls,
}

impl OverlayKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::SdhTransport => sdh::SDH_TRANSPORT_LINK,
            Self::SdhContainer => sdh::SDH_CONTAINER_LINK,
            Self::Mpls => MPLS_LINK_LABEL,
        }
    }
}

pub struct OverlayResolver<'a, S, C> {
    ctx: Ctx<'a, S, C>,
}

impl<'a, S: ObjectStore, C: ClassHierarchy> OverlayResolver<'a, S, C> {
    pub(crate) fn new(ctx: Ctx<'a, S, C>) -> Self {
        Self { ctx }
    }

    /// Shortest `[equipment, link, equipment, ...]` route, or empty when the
    /// ends are not joined within `max_route_hops` links.
    #[tracing::instrument(skip(self))]
    pub async fn find_route(&self, kind: OverlayKind, from: &ObjectRef, to: &ObjectRef) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.find_route_in(&tx, kind, from, to).await;
        self.ctx.finish(tx, result).await
    }

    /// Every simple route up to `max_route_hops` links, shortest first,
    /// capped at `max_routes`. Fails with `CycleDetected` once more than
    /// `max_route_expansions` partial routes have been expanded.
    #[tracing::instrument(skip(self))]
    pub async fn find_routes(&self, kind: OverlayKind, from: &ObjectRef, to: &ObjectRef) -> Result<Vec<Vec<ObjectRef>>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.find_routes_in(&tx, kind, from, to).await;
        self.ctx.finish(tx, result).await
    }

    async fn find_route_in(&self, tx: &S::Tx, kind: OverlayKind, from: &ObjectRef, to: &ObjectRef) -> Result<Vec<ObjectRef>> {
        self.require_equipment(tx, from).await?;
        self.require_equipment(tx, to).await?;
        if from == to {
            return Ok(vec![from.clone()]);
        }

        // equipment -> (previous equipment, link used to get here)
        let mut came_from: HashMap<ObjectRef, (ObjectRef, ObjectRef)> = HashMap::new();
        let mut visited: HashSet<ObjectRef> = HashSet::new();
        visited.insert(from.clone());
        let mut queue: VecDeque<(ObjectRef, usize)> = VecDeque::new();
        queue.push_back((from.clone(), 0));

        while let Some((node, hops)) = queue.pop_front() {
            if &node == to {
                let mut route = vec![node.clone()];
                let mut cursor = node;
                while let Some((prev, link)) = came_from.get(&cursor) {
                    route.push(link.clone());
                    route.push(prev.clone());
                    cursor = prev.clone();
                }
                route.reverse();
                tracing::debug!(?kind, from = %from, to = %to, links = hops, "route found");
                return Ok(route);
            }
            if hops >= self.ctx.config.max_route_hops {
                continue;
            }
            for (link, next) in self.neighbors(tx, kind, &node).await? {
                if visited.insert(next.clone()) {
                    came_from.insert(next.clone(), (node.clone(), link));
                    queue.push_back((next, hops + 1));
                }
            }
        }
        Ok(Vec::new())
    }

    async fn find_routes_in(
        &self,
        tx: &S::Tx,
        kind: OverlayKind,
        from: &ObjectRef,
        to: &ObjectRef,
    ) -> Result<Vec<Vec<ObjectRef>>> {
        self.require_equipment(tx, from).await?;
        self.require_equipment(tx, to).await?;
        if from == to {
            return Ok(vec![vec![from.clone()]]);
        }

        // Breadth-first over partial routes yields them shortest first.
        let mut routes = Vec::new();
        let mut queue: VecDeque<Vec<ObjectRef>> = VecDeque::new();
        queue.push_back(vec![from.clone()]);
        let mut expansions = 0usize;

        while let Some(route) = queue.pop_front() {
            if routes.len() >= self.ctx.config.max_routes {
                break;
            }
            expansions += 1;
            if expansions > self.ctx.config.max_route_expansions {
                tracing::error!(?kind, from = %from, to = %to, expansions, found = routes.len(), "route search exceeded its budget");
                return Err(Error::CycleDetected(format!(
                    "Route search from {from} to {to} expanded more than {} partial routes",
                    self.ctx.config.max_route_expansions
                )));
            }
            let Some(last) = route.last().cloned() else { continue };
            if &last == to {
                routes.push(route);
                continue;
            }
            if route.len() / 2 >= self.ctx.config.max_route_hops {
                continue;
            }
            for (link, next) in self.neighbors(tx, kind, &last).await? {
                if route.contains(&next) || route.contains(&link) {
                    continue;
                }
                let mut extended = route.clone();
                extended.push(link);
                extended.push(next);
                queue.push_back(extended);
            }
        }
        Ok(routes)
    }

    /// `(link, equipment)` pairs one hop away from `equipment`.
    async fn neighbors(&self, tx: &S::Tx, kind: OverlayKind, equipment: &ObjectRef) -> Result<Vec<(ObjectRef, ObjectRef)>> {
        let label = kind.label();
        let mut result = Vec::new();
        let to_links = self.ctx.store
            .get_edges(tx, equipment, Direction::Both, Some(EdgeKind::RelatedTo), Some(label))
            .await?;
        for edge in to_links {
            let Some(link) = edge.other_end(equipment).cloned() else { continue };
            let far = self.ctx.store
                .get_edges(tx, &link, Direction::Both, Some(EdgeKind::RelatedTo), Some(label))
                .await?;
            for far_edge in far {
                if let Some(next) = far_edge.other_end(&link)
                    && next != equipment
                {
                    result.push((link.clone(), next.clone()));
                }
            }
        }
        Ok(result)
    }

    async fn require_equipment(&self, tx: &S::Tx, obj: &ObjectRef) -> Result<()> {
        self.ctx.require(tx, obj).await?;
        if !self.ctx.is_a(obj, schema::GENERIC_COMMUNICATIONS_ELEMENT)? {
            return Err(Error::InvalidArgument(format!("{obj} is not communications equipment")));
        }
        Ok(())
    }
}
