//! In-memory class registry.

use hashbrown::HashMap;
use parking_lot::RwLock;

use super::*;
use crate::{Error, Result};

/// A thread-safe class tree. Classes are registered parent-first.
#[derive(Default)]
pub struct ClassRegistry {
    classes: RwLock<HashMap<String, ClassDescriptor>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the generic families the resolvers rely on,
    /// plus a handful of concrete classes for each.
    pub fn with_core_classes() -> Self {
        let registry = Self::new();
        for (name, parent, is_abstract) in CORE_CLASSES {
            registry
                .register(name, *parent, *is_abstract)
                .expect("core class table lists each class once, after its parent");
        }
        registry
    }

    /// Add a class. The parent must already be registered.
    pub fn register(&self, name: &str, parent: Option<&str>, is_abstract: bool) -> Result<()> {
        let mut classes = self.classes.write();
        if classes.contains_key(name) {
            return Err(Error::InvalidArgument(format!("Class {name} already exists")));
        }
        if let Some(parent) = parent
            && !classes.contains_key(parent)
        {
            return Err(Error::NotFound(format!("Class {parent}")));
        }
        classes.insert(
            name.to_owned(),
            ClassDescriptor {
                name: name.to_owned(),
                parent_name: parent.map(str::to_owned),
                is_abstract,
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClassHierarchy for ClassRegistry {
    fn is_subclass_of(&self, class_name: &str, alleged_ancestor: &str) -> Result<bool> {
        let classes = self.classes.read();
        if !classes.contains_key(alleged_ancestor) {
            return Err(Error::NotFound(format!("Class {alleged_ancestor}")));
        }
        let mut current = classes
            .get(class_name)
            .ok_or_else(|| Error::NotFound(format!("Class {class_name}")))?;
        loop {
            if current.name == alleged_ancestor {
                return Ok(true);
            }
            match current.parent_name.as_deref().and_then(|p| classes.get(p)) {
                Some(parent) => current = parent,
                None => return Ok(false),
            }
        }
    }

    fn get_class(&self, class_name: &str) -> Result<ClassDescriptor> {
        self.classes
            .read()
            .get(class_name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Class {class_name}")))
    }
}

/// (name, parent, abstract)
const CORE_CLASSES: &[(&str, Option<&str>, bool)] = &[
    (INVENTORY_OBJECT, None, true),
    // Locations
    ("GenericLocation", Some(INVENTORY_OBJECT), true),
    ("City", Some("GenericLocation"), false),
    ("Building", Some("GenericLocation"), false),
    ("Room", Some("GenericLocation"), false),
    ("Rack", Some("GenericLocation"), false),
    // Equipment
    (GENERIC_COMMUNICATIONS_ELEMENT, Some(INVENTORY_OBJECT), true),
    ("Router", Some(GENERIC_COMMUNICATIONS_ELEMENT), false),
    ("Switch", Some(GENERIC_COMMUNICATIONS_ELEMENT), false),
    ("ADM", Some(GENERIC_COMMUNICATIONS_ELEMENT), false),
    ("ODF", Some(GENERIC_COMMUNICATIONS_ELEMENT), false),
    ("GenericBoard", Some(INVENTORY_OBJECT), true),
    ("Slot", Some("GenericBoard"), false),
    ("IPBoard", Some("GenericBoard"), false),
    // Ports
    (GENERIC_PORT, Some(INVENTORY_OBJECT), true),
    ("GenericPhysicalPort", Some(GENERIC_PORT), true),
    ("OpticalPort", Some("GenericPhysicalPort"), false),
    ("ElectricalPort", Some("GenericPhysicalPort"), false),
    ("GenericLogicalPort", Some(GENERIC_PORT), true),
    ("VirtualPort", Some("GenericLogicalPort"), false),
    // MPLS pseudo-ports
    ("GenericLogicalElement", Some(INVENTORY_OBJECT), true),
    ("VRFInstance", Some("GenericLogicalElement"), false),
    ("BridgeDomain", Some("GenericLogicalElement"), false),
    ("MPLSTunnel", Some("GenericLogicalElement"), false),
    ("Pseudowire", Some("GenericLogicalElement"), false),
    // Physical connections
    (GENERIC_PHYSICAL_CONNECTION, Some(INVENTORY_OBJECT), true),
    (GENERIC_PHYSICAL_LINK, Some(GENERIC_PHYSICAL_CONNECTION), true),
    ("OpticalLink", Some(GENERIC_PHYSICAL_LINK), false),
    ("ElectricalLink", Some(GENERIC_PHYSICAL_LINK), false),
    ("PowerLink", Some(GENERIC_PHYSICAL_LINK), false),
    (GENERIC_PHYSICAL_CONTAINER, Some(GENERIC_PHYSICAL_CONNECTION), true),
    ("WireContainer", Some(GENERIC_PHYSICAL_CONTAINER), false),
    ("WirelessContainer", Some(GENERIC_PHYSICAL_CONTAINER), false),
    // Logical connections
    ("GenericLogicalConnection", Some(INVENTORY_OBJECT), true),
    (GENERIC_SDH_TRANSPORT_LINK, Some("GenericLogicalConnection"), true),
    ("STM1", Some(GENERIC_SDH_TRANSPORT_LINK), false),
    ("STM4", Some(GENERIC_SDH_TRANSPORT_LINK), false),
    ("STM16", Some(GENERIC_SDH_TRANSPORT_LINK), false),
    ("STM64", Some(GENERIC_SDH_TRANSPORT_LINK), false),
    ("STM256", Some(GENERIC_SDH_TRANSPORT_LINK), false),
    (GENERIC_SDH_CONTAINER_LINK, Some("GenericLogicalConnection"), true),
    (GENERIC_SDH_HIGH_ORDER_CONTAINER_LINK, Some(GENERIC_SDH_CONTAINER_LINK), true),
    ("VC4", Some(GENERIC_SDH_HIGH_ORDER_CONTAINER_LINK), false),
    ("VC4-04", Some(GENERIC_SDH_HIGH_ORDER_CONTAINER_LINK), false),
    ("VC4-16", Some(GENERIC_SDH_HIGH_ORDER_CONTAINER_LINK), false),
    ("VC4-64", Some(GENERIC_SDH_HIGH_ORDER_CONTAINER_LINK), false),
    (GENERIC_SDH_LOW_ORDER_CONTAINER_LINK, Some(GENERIC_SDH_CONTAINER_LINK), true),
    ("VC12", Some(GENERIC_SDH_LOW_ORDER_CONTAINER_LINK), false),
    ("VC3", Some(GENERIC_SDH_LOW_ORDER_CONTAINER_LINK), false),
    (GENERIC_SDH_TRIBUTARY_LINK, Some("GenericLogicalConnection"), true),
    (GENERIC_SDH_HIGH_ORDER_TRIBUTARY_LINK, Some(GENERIC_SDH_TRIBUTARY_LINK), true),
    ("VC4TributaryLink", Some(GENERIC_SDH_HIGH_ORDER_TRIBUTARY_LINK), false),
    ("VC4-04TributaryLink", Some(GENERIC_SDH_HIGH_ORDER_TRIBUTARY_LINK), false),
    ("GenericSDHLowOrderTributaryLink", Some(GENERIC_SDH_TRIBUTARY_LINK), true),
    ("VC12TributaryLink", Some("GenericSDHLowOrderTributaryLink"), false),
    ("VC3TributaryLink", Some("GenericSDHLowOrderTributaryLink"), false),
    (MPLS_LINK, Some("GenericLogicalConnection"), false),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_table_fully_registered() {
        let reg = ClassRegistry::with_core_classes();
        assert_eq!(reg.len(), CORE_CLASSES.len());
        for (name, parent, _) in CORE_CLASSES {
            assert_eq!(reg.get_class(name).unwrap().parent_name.as_deref(), *parent);
        }
    }

    #[test]
    fn test_subclass_walks_the_tree() {
        let reg = ClassRegistry::with_core_classes();
        assert!(reg.is_subclass_of("OpticalPort", GENERIC_PORT).unwrap());
        assert!(reg.is_subclass_of("OpticalPort", "OpticalPort").unwrap());
        assert!(reg.is_subclass_of("VC4-04", GENERIC_SDH_CONTAINER_LINK).unwrap());
        assert!(!reg.is_subclass_of("OpticalLink", GENERIC_PORT).unwrap());
        assert!(!reg.is_subclass_of("VRFInstance", GENERIC_PORT).unwrap());
    }

    #[test]
    fn test_unknown_class_is_not_found() {
        let reg = ClassRegistry::with_core_classes();
        assert!(matches!(reg.is_subclass_of("Spaceship", GENERIC_PORT), Err(Error::NotFound(_))));
        assert!(matches!(reg.is_subclass_of("OpticalPort", "Spaceship"), Err(Error::NotFound(_))));
        assert!(matches!(reg.get_class("Spaceship"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_register_requires_parent() {
        let reg = ClassRegistry::with_core_classes();
        assert!(reg.register("Satellite", Some("Orbit"), false).is_err());
        reg.register("Satellite", Some(GENERIC_COMMUNICATIONS_ELEMENT), false).unwrap();
        assert!(reg.register("Satellite", None, false).is_err());
        let desc = reg.get_class("Satellite").unwrap();
        assert_eq!(desc.parent_name.as_deref(), Some(GENERIC_COMMUNICATIONS_ELEMENT));
        assert!(!desc.is_abstract);
    }
}
