//! # Class Hierarchy Oracle
//!
//! The engine never inspects concrete class names to decide behavior.
//! Every type decision goes through [`ClassHierarchy::is_subclass_of`].

mod registry;

pub use registry::ClassRegistry;

use serde::{Deserialize, Serialize};
use crate::Result;

// Generic families the engine asks about.
pub const INVENTORY_OBJECT: &str = "InventoryObject";
pub const GENERIC_COMMUNICATIONS_ELEMENT: &str = "GenericCommunicationsElement";
pub const GENERIC_PORT: &str = "GenericPort";
pub const GENERIC_PHYSICAL_CONNECTION: &str = "GenericPhysicalConnection";
pub const GENERIC_PHYSICAL_LINK: &str = "GenericPhysicalLink";
pub const GENERIC_PHYSICAL_CONTAINER: &str = "GenericPhysicalContainer";
pub const GENERIC_SDH_TRANSPORT_LINK: &str = "GenericSDHTransportLink";
pub const GENERIC_SDH_CONTAINER_LINK: &str = "GenericSDHContainerLink";
pub const GENERIC_SDH_HIGH_ORDER_CONTAINER_LINK: &str = "GenericSDHHighOrderContainerLink";
pub const GENERIC_SDH_LOW_ORDER_CONTAINER_LINK: &str = "GenericSDHLowOrderContainerLink";
pub const GENERIC_SDH_TRIBUTARY_LINK: &str = "GenericSDHTributaryLink";
pub const GENERIC_SDH_HIGH_ORDER_TRIBUTARY_LINK: &str = "GenericSDHHighOrderTributaryLink";
pub const MPLS_LINK: &str = "MPLSLink";

/// Read-only view of one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    /// `None` only for the top of the tree.
    pub parent_name: Option<String>,
    pub is_abstract: bool,
}

/// Class metadata as consumed by the resolvers.
pub trait ClassHierarchy: Send + Sync + 'static {
    /// Whether `class_name` is `alleged_ancestor` or inherits from it.
    /// Fails with `NotFound` if either class is unknown.
    fn is_subclass_of(&self, class_name: &str, alleged_ancestor: &str) -> Result<bool>;

    /// Fails with `NotFound` if the class is unknown.
    fn get_class(&self, class_name: &str) -> Result<ClassDescriptor>;
}
