//! Inventory objects and the references that identify them.

use serde::{Deserialize, Serialize};
use super::AttributeMap;

/// Class name of the implicit root every hierarchy reports up to.
pub const ROOT_CLASS: &str = "DummyRoot";
/// Id of the implicit root.
pub const ROOT_ID: &str = "-1";
/// Class name used for pool nodes. Pools share the object node space.
pub const POOL_CLASS: &str = "Pool";

/// Identity of a node in the inventory graph.
///
/// Ids are only unique within a class, so a bare id never identifies anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub class_name: String,
    pub id: String,
}

impl ObjectRef {
    pub fn new(class_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self { class_name: class_name.into(), id: id.into() }
    }

    /// The implicit root sentinel.
    pub fn root() -> Self {
        Self::new(ROOT_CLASS, ROOT_ID)
    }

    /// Reference to the pool with the given id.
    pub fn pool(id: impl Into<String>) -> Self {
        Self::new(POOL_CLASS, id)
    }

    pub fn is_root(&self) -> bool {
        self.class_name == ROOT_CLASS && self.id == ROOT_ID
    }

    pub fn is_pool(&self) -> bool {
        self.class_name == POOL_CLASS
    }

    /// True for references that name an object of a metadata class,
    /// as opposed to the root sentinel or a pool.
    pub fn is_business_object(&self) -> bool {
        !self.is_root() && !self.is_pool()
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.id, self.class_name)
    }
}

/// An object owned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryObject {
    pub reference: ObjectRef,
    pub name: String,
    pub attributes: AttributeMap,
}

impl InventoryObject {
    pub fn new(reference: ObjectRef, name: impl Into<String>) -> Self {
        Self {
            reference,
            name: name.into(),
            attributes: AttributeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn class_name(&self) -> &str {
        &self.reference.class_name
    }

    pub fn id(&self) -> &str {
        &self.reference.id
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_sentinel() {
        let root = ObjectRef::root();
        assert!(root.is_root());
        assert!(!root.is_pool());
        assert!(!root.is_business_object());
    }

    #[test]
    fn test_same_id_different_class_is_different_object() {
        let port = ObjectRef::new("OpticalPort", "7");
        let rack = ObjectRef::new("Rack", "7");
        assert_ne!(port, rack);
        assert_eq!(port.to_string(), "7 [OpticalPort]");
    }
}
