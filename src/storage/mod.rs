//! # Object Store Trait
//!
//! This is THE contract between the traversal engine and any persistence layer.
//! The engine only needs object/pool lookups, adjacency by edge kind and label,
//! edge writes, and transactions. Everything else is the store's business.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory, buffered transactions, for tests and embedding |

pub mod memory;

use async_trait::async_trait;
use crate::model::*;
use crate::tx::{EdgeGuard, Transaction, TxMode};
use crate::Result;

pub use memory::MemoryStore;

/// The universal storage contract.
///
/// Writes issued through a transaction must be invisible to other
/// transactions until `commit_tx`, and must be discarded by `rollback_tx`
/// (or by dropping the transaction).
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// The transaction type for this store.
    type Tx: Transaction;

    // ========================================================================
    // Transactions
    // ========================================================================

    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction. Fails without applying anything if any
    /// registered guard is violated.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Register a precondition to be re-checked atomically at commit.
    async fn guard(&self, tx: &mut Self::Tx, guard: EdgeGuard) -> Result<()>;

    // ========================================================================
    // Objects
    // ========================================================================

    /// Get an object. Returns None if not found.
    async fn get_object(&self, tx: &Self::Tx, obj: &ObjectRef) -> Result<Option<InventoryObject>>;

    /// Create an object of the given class. The store assigns the id.
    async fn create_object(
        &self,
        tx: &mut Self::Tx,
        class_name: &str,
        name: &str,
        attributes: AttributeMap,
    ) -> Result<ObjectRef>;

    /// Delete an object. Fails if it still has edges.
    async fn delete_object(&self, tx: &mut Self::Tx, obj: &ObjectRef) -> Result<bool>;

    /// Every object in the store.
    async fn objects(&self, tx: &Self::Tx) -> Result<Vec<InventoryObject>>;

    /// Delete an object and every edge touching it.
    ///
    /// Default: get all edges, delete each, then delete the object.
    async fn detach_delete_object(&self, tx: &mut Self::Tx, obj: &ObjectRef) -> Result<bool> {
        let edges = self.get_edges(tx, obj, Direction::Both, None, None).await?;
        for edge in &edges {
            self.delete_edge(tx, edge.id).await?;
        }
        self.delete_object(tx, obj).await
    }

    // ========================================================================
    // Pools
    // ========================================================================

    async fn get_pool(&self, tx: &Self::Tx, id: &str) -> Result<Option<Pool>>;

    /// Create a pool node. The store assigns the id; `pool.id` is ignored.
    async fn create_pool(&self, tx: &mut Self::Tx, pool: Pool) -> Result<Pool>;

    async fn pools(&self, tx: &Self::Tx) -> Result<Vec<Pool>>;

    // ========================================================================
    // Edges
    // ========================================================================

    /// Edges touching `node`, filtered by direction, kind and label.
    async fn get_edges(
        &self,
        tx: &Self::Tx,
        node: &ObjectRef,
        dir: Direction,
        kind: Option<EdgeKind>,
        label: Option<&str>,
    ) -> Result<Vec<Edge>>;

    /// Create an edge. Both ends must exist (the root sentinel always does).
    async fn put_edge(
        &self,
        tx: &mut Self::Tx,
        kind: EdgeKind,
        label: Option<&str>,
        src: &ObjectRef,
        dst: &ObjectRef,
        props: PropertyMap,
    ) -> Result<EdgeId>;

    /// Delete an edge. Returns true if it existed.
    async fn delete_edge(&self, tx: &mut Self::Tx, id: EdgeId) -> Result<bool>;

    /// Whether `node` has at least one matching edge.
    async fn has_edge(
        &self,
        tx: &Self::Tx,
        node: &ObjectRef,
        dir: Direction,
        kind: EdgeKind,
        label: Option<&str>,
    ) -> Result<bool> {
        Ok(!self.get_edges(tx, node, dir, Some(kind), label).await?.is_empty())
    }

    /// Whether the node exists. The root always does; pools are looked up in
    /// the pool table.
    async fn exists(&self, tx: &Self::Tx, node: &ObjectRef) -> Result<bool> {
        if node.is_root() {
            return Ok(true);
        }
        if node.is_pool() {
            return Ok(self.get_pool(tx, &node.id).await?.is_some());
        }
        Ok(self.get_object(tx, node).await?.is_some())
    }
}
