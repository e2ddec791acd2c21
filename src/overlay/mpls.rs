//! MPLS links: connected like physical links (through the tracer, with
//! `mplsEndpointA/B`) and mirrored into the `mplsLink` overlay between the
//! equipment on each side.

use serde::{Deserialize, Serialize};

use super::OverlayResolver;
use crate::model::*;
use crate::physical::{ConnectionFamily, PhysicalTracer, Side};
use crate::schema::{self, ClassHierarchy};
use crate::storage::ObjectStore;
use crate::tx::TxMode;
use crate::{Error, Result};

pub const MPLS_LINK_LABEL: &str = "mplsLink";

/// An MPLS link with its ends and the equipment behind them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MplsLinkDetails {
    pub link: ObjectRef,
    pub endpoint_a: Option<ObjectRef>,
    pub endpoint_b: Option<ObjectRef>,
    pub equipment_a: Option<ObjectRef>,
    pub equipment_b: Option<ObjectRef>,
}

impl<'a, S: ObjectStore, C: ClassHierarchy> OverlayResolver<'a, S, C> {
    fn mpls_tracer(&self) -> PhysicalTracer<'a, S, C> {
        PhysicalTracer::new(self.ctx, ConnectionFamily::Mpls)
    }

    /// Connect two ports or pseudo-ports with a new MPLS link, or with the
    /// existing unconnected link `link_id`.
    #[tracing::instrument(skip(self))]
    pub async fn mpls_connect(
        &self,
        a: &ObjectRef,
        b: &ObjectRef,
        link_id: Option<&str>,
        name: &str,
    ) -> Result<ObjectRef> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<ObjectRef> = async {
            let link = self.mpls_tracer()
                .connect_in(&mut tx, a, b, schema::MPLS_LINK, link_id, name)
                .await?;
            self.attach_overlay(&mut tx, &link, Side::A, a).await?;
            self.attach_overlay(&mut tx, &link, Side::B, b).await?;
            Ok(link)
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Release one or both sides, overlay edges included.
    #[tracing::instrument(skip(self))]
    pub async fn mpls_disconnect(&self, link: &ObjectRef, side: Side) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<()> = async {
            self.mpls_tracer().disconnect_in(&mut tx, link, side).await?;
            self.detach_overlay(&mut tx, link, side).await
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Point the given sides at new ports or pseudo-ports and move the
    /// overlay edges to the equipment behind them.
    #[tracing::instrument(skip(self))]
    pub async fn mpls_reconnect(
        &self,
        link: &ObjectRef,
        new_a: Option<&ObjectRef>,
        new_b: Option<&ObjectRef>,
    ) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<()> = async {
            self.mpls_tracer().reconnect_in(&mut tx, link, new_a, new_b).await?;
            for (side, end) in [(Side::A, new_a), (Side::B, new_b)] {
                let Some(end) = end else { continue };
                self.detach_overlay(&mut tx, link, side).await?;
                self.attach_overlay(&mut tx, link, side, end).await?;
            }
            Ok(())
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mpls_link_details(&self, link: &ObjectRef) -> Result<MplsLinkDetails> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result: Result<MplsLinkDetails> = async {
            self.require_class(&tx, link, schema::MPLS_LINK).await?;
            let (endpoint_a, endpoint_b) = self.mpls_tracer().endpoints_in(&tx, link).await?;
            let equipment_a = self.overlay_peer(&tx, link, Direction::Incoming).await?;
            let equipment_b = self.overlay_peer(&tx, link, Direction::Outgoing).await?;
            Ok(MplsLinkDetails {
                link: link.clone(),
                endpoint_a,
                endpoint_b,
                equipment_a,
                equipment_b,
            })
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    async fn overlay_peer(&self, tx: &S::Tx, link: &ObjectRef, dir: Direction) -> Result<Option<ObjectRef>> {
        Ok(self.ctx.store
            .get_edges(tx, link, dir, Some(EdgeKind::RelatedTo), Some(MPLS_LINK_LABEL))
            .await?
            .into_iter()
            .next()
            .and_then(|e| e.other_end(link).cloned()))
    }

    /// Side A equipment points at the link, side B is pointed at.
    async fn attach_overlay(&self, tx: &mut S::Tx, link: &ObjectRef, side: Side, end: &ObjectRef) -> Result<()> {
        let Some(equipment) = self.equipment_if_any(tx, end).await? else { return Ok(()) };
        match side {
            Side::A => self.relate(tx, MPLS_LINK_LABEL, &equipment, link).await?,
            _ => self.relate(tx, MPLS_LINK_LABEL, link, &equipment).await?,
        };
        Ok(())
    }

    async fn detach_overlay(&self, tx: &mut S::Tx, link: &ObjectRef, side: Side) -> Result<()> {
        let directions: &[Direction] = match side {
            Side::A => &[Direction::Incoming],
            Side::B => &[Direction::Outgoing],
            Side::Both => &[Direction::Incoming, Direction::Outgoing],
        };
        for dir in directions {
            let edges = self.ctx.store
                .get_edges(tx, link, *dir, Some(EdgeKind::RelatedTo), Some(MPLS_LINK_LABEL))
                .await?;
            for edge in edges {
                self.ctx.store.delete_edge(tx, edge.id).await?;
            }
        }
        Ok(())
    }

    /// Pseudo-ports are not always held by equipment; those get no overlay
    /// edge.
    async fn equipment_if_any(&self, tx: &S::Tx, end: &ObjectRef) -> Result<Option<ObjectRef>> {
        match self.equipment_of(tx, end).await {
            Ok(equipment) => Ok(Some(equipment)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
