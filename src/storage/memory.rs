//! In-memory object store.
//!
//! This is the reference implementation of `ObjectStore`.
//! The committed graph lives behind a single `RwLock`; every transaction
//! buffers its writes and reads its own writes through an overlay.
//!
//! ## Semantics
//!
//! - **Buffered writes**: nothing a transaction does is visible to others
//!   until `commit_tx()`. `rollback_tx()` (or dropping the transaction)
//!   discards the buffer.
//! - **Atomic commit**: guards are verified and all buffered writes are
//!   applied under one write lock, so readers never see a partial mutation.
//! - **No property indexes**: adjacency is indexed per node, everything else
//!   is a scan.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::RwLock;
use async_trait::async_trait;

use crate::model::*;
use crate::tx::{EdgeGuard, Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::ObjectStore;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory inventory graph storage.
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    state: RwLock<GraphState>,
    next_object_id: AtomicU64,
    next_pool_id: AtomicU64,
    next_edge_id: AtomicU64,
    next_tx_id: AtomicU64,
}

#[derive(Default)]
struct GraphState {
    objects: HashMap<ObjectRef, InventoryObject>,
    pools: HashMap<String, Pool>,
    edges: HashMap<EdgeId, Edge>,
    /// node → ids of edges touching it, in creation order
    adjacency: HashMap<ObjectRef, Vec<EdgeId>>,
}

impl GraphState {
    fn contains(&self, node: &ObjectRef) -> bool {
        if node.is_root() {
            true
        } else if node.is_pool() {
            self.pools.contains_key(&node.id)
        } else {
            self.objects.contains_key(node)
        }
    }

    fn edges_of<'a>(&'a self, node: &ObjectRef) -> impl Iterator<Item = &'a Edge> + 'a {
        self.adjacency
            .get(node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
    }

    fn insert_edge(&mut self, edge: Edge) {
        self.adjacency.entry(edge.src.clone()).or_default().push(edge.id);
        if edge.src != edge.dst {
            self.adjacency.entry(edge.dst.clone()).or_default().push(edge.id);
        }
        self.edges.insert(edge.id, edge);
    }

    fn remove_edge(&mut self, id: EdgeId) {
        if let Some(edge) = self.edges.remove(&id) {
            for end in [&edge.src, &edge.dst] {
                if let Some(ids) = self.adjacency.get_mut(end) {
                    ids.retain(|eid| *eid != id);
                }
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: RwLock::new(GraphState::default()),
                next_object_id: AtomicU64::new(1),
                next_pool_id: AtomicU64::new(1),
                next_edge_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    /// Number of committed objects.
    pub fn object_count(&self) -> usize {
        self.inner.state.read().objects.len()
    }

    /// Number of committed edges.
    pub fn edge_count(&self) -> usize {
        self.inner.state.read().edges.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

#[derive(Debug, Clone)]
enum PendingWrite {
    PutObject(InventoryObject),
    DeleteObject(ObjectRef),
    PutPool(Pool),
    PutEdge(Edge),
    DeleteEdge(EdgeId),
}

/// In-memory transaction: a write buffer plus commit-time guards.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    writes: Vec<PendingWrite>,
    guards: Vec<EdgeGuard>,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

impl MemoryTx {
    fn ensure_writable(&self) -> Result<()> {
        match self.mode {
            TxMode::ReadWrite => Ok(()),
            TxMode::ReadOnly => Err(Error::TxError(format!("{} is read-only", self.id))),
        }
    }

    /// `Some(Some(obj))` if this tx wrote the object, `Some(None)` if it
    /// deleted it, `None` if it did not touch it.
    fn pending_object(&self, obj: &ObjectRef) -> Option<Option<&InventoryObject>> {
        self.writes.iter().rev().find_map(|w| match w {
            PendingWrite::PutObject(o) if &o.reference == obj => Some(Some(o)),
            PendingWrite::DeleteObject(r) if r == obj => Some(None),
            _ => None,
        })
    }

    fn pending_pool(&self, id: &str) -> Option<&Pool> {
        self.writes.iter().rev().find_map(|w| match w {
            PendingWrite::PutPool(p) if p.id == id => Some(p),
            _ => None,
        })
    }

    fn deleted_edges(&self) -> HashSet<EdgeId> {
        self.writes
            .iter()
            .filter_map(|w| match w {
                PendingWrite::DeleteEdge(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn added_edges(&self) -> impl Iterator<Item = &Edge> {
        self.writes.iter().filter_map(|w| match w {
            PendingWrite::PutEdge(e) => Some(e),
            _ => None,
        })
    }
}

// ============================================================================
// Overlay reads
// ============================================================================

impl MemoryStore {
    fn overlay_edges(&self, tx: &MemoryTx, node: &ObjectRef) -> Vec<Edge> {
        let deleted = tx.deleted_edges();
        let state = self.inner.state.read();
        let mut edges: Vec<Edge> = state
            .edges_of(node)
            .filter(|e| !deleted.contains(&e.id))
            .cloned()
            .collect();
        edges.extend(
            tx.added_edges()
                .filter(|e| e.touches(node) && !deleted.contains(&e.id))
                .cloned(),
        );
        edges.sort_by_key(|e| e.id);
        edges
    }

    fn overlay_contains(&self, tx: &MemoryTx, node: &ObjectRef) -> bool {
        if node.is_root() {
            return true;
        }
        if node.is_pool() {
            return tx.pending_pool(&node.id).is_some()
                || self.inner.state.read().pools.contains_key(&node.id);
        }
        match tx.pending_object(node) {
            Some(found) => found.is_some(),
            None => self.inner.state.read().objects.contains_key(node),
        }
    }
}

// ============================================================================
// ObjectStore impl
// ============================================================================

#[async_trait]
impl ObjectStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode, writes: Vec::new(), guards: Vec::new() })
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        if tx.writes.is_empty() && tx.guards.is_empty() {
            return Ok(());
        }

        let mut state = self.inner.state.write();

        // Phase 1: guards, against committed state only.
        for guard in &tx.guards {
            if state.edges_of(&guard.node).any(|e| guard.is_violated_by(e)) {
                tracing::debug!(tx = %tx.id, node = %guard.node, "commit guard violated");
                return Err(Error::BusinessConstraintViolation(guard.reason.clone()));
            }
        }

        // Phase 2: validate that the buffered writes still apply.
        let deleted_edges = tx.deleted_edges();
        let mut created: HashSet<ObjectRef> = HashSet::new();
        for write in &tx.writes {
            match write {
                PendingWrite::PutObject(o) => { created.insert(o.reference.clone()); }
                PendingWrite::PutPool(p) => { created.insert(p.reference()); }
                PendingWrite::PutEdge(e) => {
                    for end in [&e.src, &e.dst] {
                        if !state.contains(end) && !created.contains(end) {
                            return Err(Error::TxError(format!(
                                "{end} was removed by a concurrent transaction"
                            )));
                        }
                    }
                }
                PendingWrite::DeleteObject(obj) => {
                    let dangling = state
                        .edges_of(obj)
                        .filter(|e| !deleted_edges.contains(&e.id))
                        .count();
                    if dangling > 0 {
                        return Err(Error::TxError(format!(
                            "{obj} gained {dangling} edges from a concurrent transaction"
                        )));
                    }
                }
                PendingWrite::DeleteEdge(_) => {}
            }
        }

        // Phase 3: apply in order.
        let count = tx.writes.len();
        for write in tx.writes {
            match write {
                PendingWrite::PutObject(o) => { state.objects.insert(o.reference.clone(), o); }
                PendingWrite::DeleteObject(obj) => {
                    state.objects.remove(&obj);
                    state.adjacency.remove(&obj);
                }
                PendingWrite::PutPool(p) => { state.pools.insert(p.id.clone(), p); }
                PendingWrite::PutEdge(e) => state.insert_edge(e),
                PendingWrite::DeleteEdge(id) => state.remove_edge(id),
            }
        }
        tracing::debug!(tx = %tx.id, writes = count, "transaction committed");
        Ok(())
    }

    /// Buffered writes are simply dropped.
    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        tracing::debug!(tx = %tx.id, discarded = tx.writes.len(), "transaction rolled back");
        Ok(())
    }

    async fn guard(&self, tx: &mut MemoryTx, guard: EdgeGuard) -> Result<()> {
        tx.ensure_writable()?;
        tx.guards.push(guard);
        Ok(())
    }

    // ========================================================================
    // Objects
    // ========================================================================

    async fn get_object(&self, tx: &MemoryTx, obj: &ObjectRef) -> Result<Option<InventoryObject>> {
        if let Some(pending) = tx.pending_object(obj) {
            return Ok(pending.cloned());
        }
        Ok(self.inner.state.read().objects.get(obj).cloned())
    }

    async fn create_object(
        &self,
        tx: &mut MemoryTx,
        class_name: &str,
        name: &str,
        attributes: AttributeMap,
    ) -> Result<ObjectRef> {
        tx.ensure_writable()?;
        if class_name.is_empty() {
            return Err(Error::InvalidArgument("class name cannot be empty".into()));
        }
        let id = self.inner.next_object_id.fetch_add(1, Ordering::Relaxed);
        let reference = ObjectRef::new(class_name, id.to_string());
        let object = InventoryObject {
            reference: reference.clone(),
            name: name.to_owned(),
            attributes,
        };
        tx.writes.push(PendingWrite::PutObject(object));
        Ok(reference)
    }

    async fn delete_object(&self, tx: &mut MemoryTx, obj: &ObjectRef) -> Result<bool> {
        tx.ensure_writable()?;
        if !self.overlay_contains(tx, obj) {
            return Ok(false);
        }
        let edges = self.overlay_edges(tx, obj);
        if !edges.is_empty() {
            return Err(Error::BusinessConstraintViolation(format!(
                "Cannot delete {obj} with {} edges. Release them first.",
                edges.len()
            )));
        }
        tx.writes.push(PendingWrite::DeleteObject(obj.clone()));
        Ok(true)
    }

    async fn objects(&self, tx: &MemoryTx) -> Result<Vec<InventoryObject>> {
        let mut result: HashMap<ObjectRef, InventoryObject> =
            self.inner.state.read().objects.clone();
        for write in &tx.writes {
            match write {
                PendingWrite::PutObject(o) => { result.insert(o.reference.clone(), o.clone()); }
                PendingWrite::DeleteObject(r) => { result.remove(r); }
                _ => {}
            }
        }
        let mut objects: Vec<InventoryObject> = result.into_values().collect();
        objects.sort_by(|a, b| a.reference.cmp(&b.reference));
        Ok(objects)
    }

    // ========================================================================
    // Pools
    // ========================================================================

    async fn get_pool(&self, tx: &MemoryTx, id: &str) -> Result<Option<Pool>> {
        if let Some(pool) = tx.pending_pool(id) {
            return Ok(Some(pool.clone()));
        }
        Ok(self.inner.state.read().pools.get(id).cloned())
    }

    async fn create_pool(&self, tx: &mut MemoryTx, mut pool: Pool) -> Result<Pool> {
        tx.ensure_writable()?;
        pool.id = format!("pool-{}", self.inner.next_pool_id.fetch_add(1, Ordering::Relaxed));
        tx.writes.push(PendingWrite::PutPool(pool.clone()));
        Ok(pool)
    }

    async fn pools(&self, tx: &MemoryTx) -> Result<Vec<Pool>> {
        let mut result: HashMap<String, Pool> = self.inner.state.read().pools.clone();
        for write in &tx.writes {
            if let PendingWrite::PutPool(p) = write {
                result.insert(p.id.clone(), p.clone());
            }
        }
        let mut pools: Vec<Pool> = result.into_values().collect();
        pools.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pools)
    }

    // ========================================================================
    // Edges
    // ========================================================================

    async fn get_edges(
        &self,
        tx: &MemoryTx,
        node: &ObjectRef,
        dir: Direction,
        kind: Option<EdgeKind>,
        label: Option<&str>,
    ) -> Result<Vec<Edge>> {
        Ok(self
            .overlay_edges(tx, node)
            .into_iter()
            .filter(|e| e.matches_direction(node, dir))
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .filter(|e| label.is_none_or(|l| e.has_label(l)))
            .collect())
    }

    async fn put_edge(
        &self,
        tx: &mut MemoryTx,
        kind: EdgeKind,
        label: Option<&str>,
        src: &ObjectRef,
        dst: &ObjectRef,
        props: PropertyMap,
    ) -> Result<EdgeId> {
        tx.ensure_writable()?;
        if src == dst {
            return Err(Error::InvalidArgument(format!("{src} can not be related with itself")));
        }
        if !self.overlay_contains(tx, src) {
            return Err(Error::NotFound(format!("Source node {src}")));
        }
        if !self.overlay_contains(tx, dst) {
            return Err(Error::NotFound(format!("Target node {dst}")));
        }

        let id = EdgeId(self.inner.next_edge_id.fetch_add(1, Ordering::Relaxed));
        tx.writes.push(PendingWrite::PutEdge(Edge {
            id,
            kind,
            label: label.map(str::to_owned),
            src: src.clone(),
            dst: dst.clone(),
            properties: props,
        }));
        Ok(id)
    }

    async fn delete_edge(&self, tx: &mut MemoryTx, id: EdgeId) -> Result<bool> {
        tx.ensure_writable()?;
        if tx.deleted_edges().contains(&id) {
            return Ok(false);
        }
        let exists = tx.added_edges().any(|e| e.id == id)
            || self.inner.state.read().edges.contains_key(&id);
        if exists {
            tx.writes.push(PendingWrite::DeleteEdge(id));
        }
        Ok(exists)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn object(db: &MemoryStore, tx: &mut MemoryTx, class: &str, name: &str) -> ObjectRef {
        db.create_object(tx, class, name, AttributeMap::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_object() {
        let db = MemoryStore::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let mut attrs = AttributeMap::new();
        attrs.insert("serialNumber".into(), "SN-1".into());
        let r = db.create_object(&mut tx, "Router", "core-1", attrs).await.unwrap();

        let obj = db.get_object(&tx, &r).await.unwrap().unwrap();
        assert_eq!(obj.name, "core-1");
        assert_eq!(obj.get("serialNumber"), Some("SN-1"));
        db.commit_tx(tx).await.unwrap();
        assert_eq!(db.object_count(), 1);
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let db = MemoryStore::new();
        let mut writer = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let r = object(&db, &mut writer, "Router", "r").await;

        let reader = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(db.get_object(&reader, &r).await.unwrap().is_none());

        db.commit_tx(writer).await.unwrap();
        assert!(db.get_object(&reader, &r).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_everything() {
        let db = MemoryStore::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let a = object(&db, &mut tx, "Router", "a").await;
        let b = object(&db, &mut tx, "Router", "b").await;
        db.put_edge(&mut tx, EdgeKind::RelatedTo, Some("uses"), &a, &b, PropertyMap::new())
            .await
            .unwrap();
        db.rollback_tx(tx).await.unwrap();

        assert_eq!(db.object_count(), 0);
        assert_eq!(db.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_read_only_tx_rejects_writes() {
        let db = MemoryStore::new();
        let mut tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        let result = db.create_object(&mut tx, "Router", "r", AttributeMap::new()).await;
        assert!(matches!(result, Err(Error::TxError(_))));
    }

    #[tokio::test]
    async fn test_cannot_delete_connected_object() {
        let db = MemoryStore::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let a = object(&db, &mut tx, "Router", "a").await;
        let b = object(&db, &mut tx, "Router", "b").await;
        db.put_edge(&mut tx, EdgeKind::ChildOf, None, &a, &b, PropertyMap::new()).await.unwrap();

        assert!(db.delete_object(&mut tx, &a).await.is_err());
        assert!(db.detach_delete_object(&mut tx, &a).await.unwrap());
        assert!(db.get_object(&tx, &a).await.unwrap().is_none());
        db.commit_tx(tx).await.unwrap();
        assert_eq!(db.edge_count(), 0);
        assert_eq!(db.object_count(), 1);
    }

    #[tokio::test]
    async fn test_edge_filters() {
        let db = MemoryStore::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let link = object(&db, &mut tx, "OpticalLink", "l").await;
        let a = object(&db, &mut tx, "OpticalPort", "a").await;
        let b = object(&db, &mut tx, "OpticalPort", "b").await;
        db.put_edge(&mut tx, EdgeKind::RelatedTo, Some("endpointA"), &link, &a, PropertyMap::new())
            .await
            .unwrap();
        db.put_edge(&mut tx, EdgeKind::RelatedTo, Some("endpointB"), &link, &b, PropertyMap::new())
            .await
            .unwrap();
        db.commit_tx(tx).await.unwrap();

        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        let out = db.get_edges(&tx, &link, Direction::Outgoing, Some(EdgeKind::RelatedTo), None)
            .await
            .unwrap();
        assert_eq!(out.len(), 2);

        let a_side = db.get_edges(&tx, &link, Direction::Outgoing, None, Some("endpointA"))
            .await
            .unwrap();
        assert_eq!(a_side.len(), 1);
        assert_eq!(a_side[0].dst, a);

        let incoming = db.get_edges(&tx, &link, Direction::Incoming, None, None).await.unwrap();
        assert!(incoming.is_empty());
    }

    #[tokio::test]
    async fn test_self_edge_rejected() {
        let db = MemoryStore::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let a = object(&db, &mut tx, "OpticalPort", "a").await;
        let result = db.put_edge(&mut tx, EdgeKind::RelatedTo, Some("mirror"), &a, &a, PropertyMap::new()).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_guard_fails_commit_atomically() {
        let db = MemoryStore::new();
        let mut setup = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let port = object(&db, &mut setup, "OpticalPort", "p").await;
        let l1 = object(&db, &mut setup, "OpticalLink", "l1").await;
        let l2 = object(&db, &mut setup, "OpticalLink", "l2").await;
        db.commit_tx(setup).await.unwrap();

        let guard = || EdgeGuard::absent(
            port.clone(),
            Direction::Incoming,
            EdgeKind::RelatedTo,
            &["endpointA", "endpointB"],
            "port already connected",
        );

        let mut first = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let mut second = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        for (tx, link) in [(&mut first, &l1), (&mut second, &l2)] {
            db.guard(tx, guard()).await.unwrap();
            db.put_edge(tx, EdgeKind::RelatedTo, Some("endpointA"), link, &port, PropertyMap::new())
                .await
                .unwrap();
        }

        db.commit_tx(first).await.unwrap();
        let result = db.commit_tx(second).await;
        assert!(matches!(result, Err(Error::BusinessConstraintViolation(_))));
        assert_eq!(db.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_pools_share_node_space() {
        let db = MemoryStore::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let pool = db.create_pool(&mut tx, Pool {
            id: String::new(),
            name: "Spare routers".into(),
            description: String::new(),
            instances_of_class: "Router".into(),
            pool_type: 1,
        }).await.unwrap();
        let r = object(&db, &mut tx, "Router", "r").await;
        db.put_edge(&mut tx, EdgeKind::ChildOfSpecial, Some("pool"), &r, &pool.reference(), PropertyMap::new())
            .await
            .unwrap();
        db.commit_tx(tx).await.unwrap();

        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(db.exists(&tx, &pool.reference()).await.unwrap());
        assert_eq!(db.pools(&tx).await.unwrap().len(), 1);
    }
}
