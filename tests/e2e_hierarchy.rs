//! End-to-end tests for containment hierarchy queries and moves.
//!
//! Fixtures are wired through the `ObjectStore` API, then queried through
//! `Inventory::hierarchy()`.

use inventory_topology::{
    AttributeMap, EdgeKind, Error, Inventory, MemoryStore, ClassRegistry, ObjectRef, ObjectStore,
    PropertyMap, TxMode,
};
use pretty_assertions::assert_eq;

type Inv = Inventory<MemoryStore, ClassRegistry>;

// ============================================================================
// Fixture
//
//   City
//   ├── Building A
//   │   ├── Rack 1
//   │   │   └── Router r1 ── OpticalPort p1, OpticalPort p2
//   │   └── Rack 2
//   │       └── Router r2 ── OpticalPort p3
//   └── Building B
//   Building C (directly under the root)
// ============================================================================

struct Site {
    city: ObjectRef,
    building_a: ObjectRef,
    building_b: ObjectRef,
    building_c: ObjectRef,
    rack1: ObjectRef,
    rack2: ObjectRef,
    r1: ObjectRef,
    r2: ObjectRef,
    p1: ObjectRef,
    p2: ObjectRef,
    p3: ObjectRef,
}

async fn make(
    store: &MemoryStore,
    tx: &mut <MemoryStore as ObjectStore>::Tx,
    class: &str,
    name: &str,
    parent: Option<&ObjectRef>,
) -> ObjectRef {
    let obj = store.create_object(tx, class, name, AttributeMap::new()).await.unwrap();
    if let Some(parent) = parent {
        store.put_edge(tx, EdgeKind::ChildOf, None, &obj, parent, PropertyMap::new()).await.unwrap();
    }
    obj
}

async fn setup_site() -> (Inv, Site) {
    let inv = Inventory::open_memory();
    let store = inv.store();
    let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();

    let city = make(store, &mut tx, "City", "Lisbon", None).await;
    let building_a = make(store, &mut tx, "Building", "A", Some(&city)).await;
    let building_b = make(store, &mut tx, "Building", "B", Some(&city)).await;
    let building_c = make(store, &mut tx, "Building", "C", None).await;
    let rack1 = make(store, &mut tx, "Rack", "1", Some(&building_a)).await;
    let rack2 = make(store, &mut tx, "Rack", "2", Some(&building_a)).await;
    let r1 = make(store, &mut tx, "Router", "r1", Some(&rack1)).await;
    let r2 = make(store, &mut tx, "Router", "r2", Some(&rack2)).await;
    let p1 = make(store, &mut tx, "OpticalPort", "p1", Some(&r1)).await;
    let p2 = make(store, &mut tx, "OpticalPort", "p2", Some(&r1)).await;
    let p3 = make(store, &mut tx, "OpticalPort", "p3", Some(&r2)).await;

    store.commit_tx(tx).await.unwrap();
    (inv, Site { city, building_a, building_b, building_c, rack1, rack2, r1, r2, p1, p2, p3 })
}

// ============================================================================
// 1. Parents and ancestors
// ============================================================================

#[tokio::test]
async fn test_ancestors_nearest_first() {
    let (inv, s) = setup_site().await;
    let chain = inv.hierarchy().ancestors(&s.p3).await.unwrap();
    assert_eq!(
        chain,
        vec![s.r2.clone(), s.rack2.clone(), s.building_a.clone(), s.city.clone(), ObjectRef::root()]
    );
}

#[tokio::test]
async fn test_standard_parent_falls_back_to_root() {
    let (inv, s) = setup_site().await;
    let h = inv.hierarchy();
    assert_eq!(h.standard_parent(&s.building_c).await.unwrap(), Some(ObjectRef::root()));
    assert_eq!(h.special_parent(&s.building_c).await.unwrap(), None);
    assert_eq!(h.standard_parent(&s.p1).await.unwrap(), Some(s.r1.clone()));
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    let (inv, _) = setup_site().await;
    let ghost = ObjectRef::new("Router", "404");
    assert!(matches!(inv.hierarchy().parent(&ghost).await, Err(Error::NotFound(_))));
    assert!(matches!(inv.hierarchy().ancestors(&ghost).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_ancestors_until_class_stops_at_match() {
    let (inv, s) = setup_site().await;
    let h = inv.hierarchy();
    assert_eq!(
        h.ancestors_until_class(&s.p1, "GenericLocation").await.unwrap(),
        vec![s.r1.clone(), s.rack1.clone()]
    );
    // No match: the chain stops short of the root.
    assert_eq!(
        h.ancestors_until_class(&s.p1, "GenericPort").await.unwrap(),
        vec![s.r1.clone(), s.rack1.clone(), s.building_a.clone(), s.city.clone()]
    );
}

#[tokio::test]
async fn test_first_ancestor_of_class_falls_back_to_root() {
    let (inv, s) = setup_site().await;
    let h = inv.hierarchy();
    assert_eq!(h.first_ancestor_of_class(&s.p1, "Building").await.unwrap(), s.building_a);
    assert_eq!(h.first_ancestor_of_class(&s.p1, "GenericPhysicalLink").await.unwrap(), ObjectRef::root());
}

// ============================================================================
// 2. Common ancestor
// ============================================================================

#[tokio::test]
async fn test_common_ancestor_cases() {
    let (inv, s) = setup_site().await;
    let h = inv.hierarchy();

    assert_eq!(h.common_ancestor(&s.p1, &s.p2).await.unwrap(), s.r1);
    assert_eq!(h.common_ancestor(&s.p1, &s.p3).await.unwrap(), s.building_a);
    assert_eq!(h.common_ancestor(&s.p3, &s.p1).await.unwrap(), s.building_a);
    assert_eq!(h.common_ancestor(&s.p1, &s.building_b).await.unwrap(), s.city);
    assert_eq!(h.common_ancestor(&s.p1, &s.building_c).await.unwrap(), ObjectRef::root());
    assert_eq!(h.common_ancestor(&s.p1, &s.r1).await.unwrap(), s.r1);
    assert_eq!(h.common_ancestor(&s.p2, &s.p2).await.unwrap(), s.p2);
}

// ============================================================================
// 3. Children and siblings
// ============================================================================

#[tokio::test]
async fn test_root_children_are_parentless_objects() {
    let (inv, s) = setup_site().await;
    let mut top = inv.hierarchy().children(&ObjectRef::root(), None).await.unwrap();
    top.sort();
    let mut expected = vec![s.city.clone(), s.building_c.clone()];
    expected.sort();
    assert_eq!(top, expected);
}

#[tokio::test]
async fn test_children_filter() {
    let (inv, s) = setup_site().await;
    let h = inv.hierarchy();
    assert_eq!(h.children(&s.building_a, None).await.unwrap(), vec![s.rack1.clone(), s.rack2.clone()]);
    assert!(h.children(&s.building_a, Some("GenericPort")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recursive_filter_does_not_prune() {
    let (inv, s) = setup_site().await;
    let ports = inv.hierarchy().children_recursive(&s.building_a, Some("GenericPort")).await.unwrap();
    assert_eq!(ports, vec![s.p1.clone(), s.p2.clone(), s.p3.clone()]);

    let all = inv.hierarchy().children_recursive(&s.building_a, None).await.unwrap();
    assert_eq!(all, vec![s.rack1, s.r1, s.p1, s.p2, s.rack2, s.r2, s.p3]);
}

#[tokio::test]
async fn test_siblings() {
    let (inv, s) = setup_site().await;
    let h = inv.hierarchy();
    assert_eq!(h.siblings(&s.p1).await.unwrap(), vec![s.p2.clone()]);
    assert!(h.siblings(&s.p3).await.unwrap().is_empty());
    assert_eq!(h.siblings(&s.building_c).await.unwrap(), vec![s.city.clone()]);
    assert!(h.siblings(&ObjectRef::root()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_special_children() {
    let (inv, s) = setup_site().await;
    let store = inv.store();
    let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
    let link = store.create_object(&mut tx, "OpticalLink", "l", AttributeMap::new()).await.unwrap();
    store.put_edge(&mut tx, EdgeKind::ChildOfSpecial, None, &link, &s.r1, PropertyMap::new()).await.unwrap();
    store.commit_tx(tx).await.unwrap();

    let h = inv.hierarchy();
    assert_eq!(h.special_children(&s.r1, None).await.unwrap(), vec![link.clone()]);
    assert!(h.children(&s.r1, Some("GenericPhysicalLink")).await.unwrap().is_empty());
    assert_eq!(h.special_children_recursive(&s.r1, Some("OpticalLink")).await.unwrap(), vec![link.clone()]);
    assert_eq!(h.parent(&link).await.unwrap(), Some(s.r1.clone()));
    assert_eq!(h.siblings(&link).await.unwrap(), Vec::<ObjectRef>::new());
}

// ============================================================================
// 4. Moves
// ============================================================================

#[tokio::test]
async fn test_move_objects_reparents() {
    let (inv, s) = setup_site().await;
    let h = inv.hierarchy();
    h.move_objects(&s.rack1, &[s.p3.clone()]).await.unwrap();
    assert_eq!(h.parent(&s.p3).await.unwrap(), Some(s.rack1.clone()));
    assert_eq!(h.children(&s.r2, None).await.unwrap(), Vec::<ObjectRef>::new());

    h.move_objects(&ObjectRef::root(), &[s.building_b.clone()]).await.unwrap();
    assert_eq!(h.parent(&s.building_b).await.unwrap(), Some(ObjectRef::root()));
}

#[tokio::test]
async fn test_move_cycle_rolls_back_whole_batch() {
    let (inv, s) = setup_site().await;
    let h = inv.hierarchy();
    let result = h.move_objects(&s.r1, &[s.p3.clone(), s.building_a.clone()]).await;
    assert!(matches!(result, Err(Error::BusinessConstraintViolation(_))));
    // The first move in the batch was discarded too.
    assert_eq!(h.parent(&s.p3).await.unwrap(), Some(s.r2.clone()));
}

#[tokio::test]
async fn test_move_special_objects() {
    let (inv, s) = setup_site().await;
    let h = inv.hierarchy();
    h.move_special_objects(&s.building_b, &[s.building_c.clone()]).await.unwrap();
    assert_eq!(h.special_parent(&s.building_c).await.unwrap(), Some(s.building_b.clone()));
    assert_eq!(h.special_children(&s.building_b, None).await.unwrap(), vec![s.building_c.clone()]);

    h.move_special_objects(&ObjectRef::root(), &[s.building_c.clone()]).await.unwrap();
    assert_eq!(h.special_parent(&s.building_c).await.unwrap(), None);
}
