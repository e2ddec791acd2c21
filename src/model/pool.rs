//! Pools: typed administrative containers.

use serde::{Deserialize, Serialize};
use super::ObjectRef;

/// A pool of objects of a single class family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Class (or superclass) every item in this pool must be an instance of.
    pub instances_of_class: String,
    /// Application-defined pool type (e.g. general purpose, services, IP).
    pub pool_type: u32,
}

impl Pool {
    pub fn reference(&self) -> ObjectRef {
        ObjectRef::pool(self.id.clone())
    }
}

/// Where a new pool is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolParent {
    /// Top-level pool, no parent.
    Root,
    /// Pool hanging from an inventory object.
    Object(ObjectRef),
    /// Pool nested in another pool.
    Pool(String),
}
