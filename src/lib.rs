//! # inventory-topology: Graph Traversal Engine for Network Inventory
//!
//! Answers structural questions over a graph of typed inventory objects:
//! containment ancestry, pools, physical paths through ports and links, and
//! SDH/MPLS routes over derived overlay graphs. Multi-edge mutations run as
//! one transaction each.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `ObjectStore` is the contract between resolvers and storage
//! 2. **Clean DTOs**: `ObjectRef`, `Edge`, `Pool` cross all boundaries
//! 3. **Class checks through one call**: `ClassHierarchy::is_subclass_of`
//! 4. **One transaction per operation**, committed once
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use inventory_topology::{Inventory, ObjectStore, AttributeMap, TxMode};
//!
//! # async fn example() -> inventory_topology::Result<()> {
//! let inventory = Inventory::open_memory();
//!
//! let store = inventory.store();
//! let mut tx = store.begin_tx(TxMode::ReadWrite).await?;
//! let port = store.create_object(&mut tx, "OpticalPort", "gi0/1", AttributeMap::new()).await?;
//! store.commit_tx(tx).await?;
//!
//! let path = inventory.physical().physical_path(&port).await?;
//! assert_eq!(path, vec![port]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! | Store | Description |
//! |-------|-------------|
//! | `MemoryStore` | In-memory graph with buffered transactions |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod schema;
pub mod config;
pub mod hierarchy;
pub mod pool;
pub mod physical;
pub mod overlay;

mod context;

use context::Ctx;

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{
    ObjectRef, InventoryObject, Edge, EdgeId, EdgeKind, Direction,
    Pool, PoolParent, Value, PropertyMap, AttributeMap,
    ContainerPositionEntry,
};
pub use storage::{ObjectStore, MemoryStore};
pub use tx::{Transaction, TxMode, TxId, EdgeGuard};
pub use schema::{ClassHierarchy, ClassRegistry, ClassDescriptor};
pub use config::EngineConfig;
pub use hierarchy::HierarchyResolver;
pub use pool::PoolResolver;
pub use physical::{ConnectionFamily, PhysicalTracer, Side};
pub use overlay::{MplsLinkDetails, OverlayKind, OverlayResolver};

// ============================================================================
// Top-level Inventory handle
// ============================================================================

/// The primary entry point. Wraps a store and a class oracle and hands out
/// resolvers that borrow both.
pub struct Inventory<S: ObjectStore, C: ClassHierarchy> {
    store: S,
    classes: C,
    config: EngineConfig,
}

impl<S: ObjectStore, C: ClassHierarchy> Inventory<S, C> {
    pub fn new(store: S, classes: C) -> Self {
        Self::with_config(store, classes, EngineConfig::default())
    }

    pub fn with_config(store: S, classes: C, config: EngineConfig) -> Self {
        Self { store, classes, config }
    }

    /// Access the underlying store (fixtures, raw edges).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn classes(&self) -> &C {
        &self.classes
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn ctx(&self) -> Ctx<'_, S, C> {
        Ctx { store: &self.store, classes: &self.classes, config: &self.config }
    }

    pub fn hierarchy(&self) -> HierarchyResolver<'_, S, C> {
        HierarchyResolver::new(self.ctx())
    }

    pub fn pools(&self) -> PoolResolver<'_, S, C> {
        PoolResolver::new(self.ctx())
    }

    /// Tracer over physical links and containers. MPLS links are connected
    /// through [`OverlayResolver`], which keeps the `mplsLink` overlay in step.
    pub fn physical(&self) -> PhysicalTracer<'_, S, C> {
        PhysicalTracer::new(self.ctx(), ConnectionFamily::Physical)
    }

    pub fn overlay(&self) -> OverlayResolver<'_, S, C> {
        OverlayResolver::new(self.ctx())
    }
}

/// In-memory inventory seeded with the core class families.
impl Inventory<MemoryStore, ClassRegistry> {
    pub fn open_memory() -> Self {
        Self::new(MemoryStore::new(), ClassRegistry::with_core_classes())
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Business constraint violation: {0}")]
    BusinessConstraintViolation(String),

    #[error("Has dependent connections: {0}")]
    HasDependentConnections(String),

    #[error("Cycle detected: {0}")]
    CycleDetected(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
