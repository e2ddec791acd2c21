//! End-to-end tests for pools: nesting, membership, move and copy.

use inventory_topology::{
    AttributeMap, ClassRegistry, EdgeKind, EngineConfig, Error, Inventory, MemoryStore, ObjectRef,
    ObjectStore, PoolParent, PropertyMap, TxMode,
};
use pretty_assertions::assert_eq;

type Inv = Inventory<MemoryStore, ClassRegistry>;

// ============================================================================
// Helpers
// ============================================================================

/// Router `r` holding board `b` holding port `p`, all under rack `k`.
/// Returns (rack, router, board, port).
async fn setup_equipment(inv: &Inv) -> (ObjectRef, ObjectRef, ObjectRef, ObjectRef) {
    let store = inv.store();
    let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
    let mut attrs = AttributeMap::new();
    attrs.insert("vendor".into(), "Acme".into());
    let rack = store.create_object(&mut tx, "Rack", "k", AttributeMap::new()).await.unwrap();
    let router = store.create_object(&mut tx, "Router", "r", attrs).await.unwrap();
    let board = store.create_object(&mut tx, "IPBoard", "b", AttributeMap::new()).await.unwrap();
    let port = store.create_object(&mut tx, "OpticalPort", "p", AttributeMap::new()).await.unwrap();
    for (child, parent) in [(&router, &rack), (&board, &router), (&port, &board)] {
        store.put_edge(&mut tx, EdgeKind::ChildOf, None, child, parent, PropertyMap::new()).await.unwrap();
    }
    store.commit_tx(tx).await.unwrap();
    (rack, router, board, port)
}

// ============================================================================
// 1. Pool tree
// ============================================================================

#[tokio::test]
async fn test_pools_in_object_and_pool() {
    let inv = Inventory::open_memory();
    let (rack, ..) = setup_equipment(&inv).await;
    let pools = inv.pools();

    let spares = pools
        .create_pool(PoolParent::Object(rack.clone()), "Spares", "rack spares", "GenericPort", 1)
        .await
        .unwrap();
    let optics = pools
        .create_pool(PoolParent::Pool(spares.id.clone()), "Optics", "", "OpticalPort", 1)
        .await
        .unwrap();

    assert_eq!(pools.pools_in_object(&rack, None).await.unwrap(), vec![spares.clone()]);
    assert!(pools.pools_in_object(&rack, Some("Router")).await.unwrap().is_empty());
    assert_eq!(pools.pools_in_pool(&spares.id, Some("OpticalPort")).await.unwrap(), vec![optics.clone()]);
    assert!(pools.root_pools(None, None, false).await.unwrap().is_empty());
    assert_eq!(pools.pool(&optics.id).await.unwrap().description, "");
}

#[tokio::test]
async fn test_create_pool_validates_parent_and_class() {
    let inv = Inventory::open_memory();
    let pools = inv.pools();
    let ghost = ObjectRef::new("Rack", "missing");
    assert!(matches!(
        pools.create_pool(PoolParent::Object(ghost), "x", "", "Router", 1).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        pools.create_pool(PoolParent::Root, "x", "", "Spaceship", 1).await,
        Err(Error::NotFound(_))
    ));
    assert!(pools.root_pools(None, None, false).await.unwrap().is_empty());
}

// ============================================================================
// 2. Membership
// ============================================================================

#[tokio::test]
async fn test_move_item_to_pool() {
    let inv = Inventory::open_memory();
    let (_, router, board, _) = setup_equipment(&inv).await;
    let pools = inv.pools();
    let spares = pools.create_pool(PoolParent::Root, "Spare boards", "", "GenericBoard", 1).await.unwrap();

    pools.move_item_to_pool(&spares.id, &board).await.unwrap();

    assert_eq!(pools.items_in_pool(&spares.id, None).await.unwrap(), vec![board.clone()]);
    assert_eq!(inv.hierarchy().parent(&board).await.unwrap(), Some(spares.reference()));
    assert!(inv.hierarchy().children(&router, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_move_item_of_wrong_class() {
    let inv = Inventory::open_memory();
    let (_, router, ..) = setup_equipment(&inv).await;
    let pools = inv.pools();
    let ports = pools.create_pool(PoolParent::Root, "Ports", "", "GenericPort", 1).await.unwrap();

    let result = pools.move_item_to_pool(&ports.id, &router).await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(pools.items_in_pool(&ports.id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_items_in_pool_limit_and_nested_pools() {
    let inv = Inventory::open_memory();
    let pools = inv.pools();
    let bin = pools.create_pool(PoolParent::Root, "Bin", "", "OpticalPort", 1).await.unwrap();
    pools.create_pool(PoolParent::Pool(bin.id.clone()), "Sub-bin", "", "OpticalPort", 1).await.unwrap();

    let store = inv.store();
    let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
    let mut ports = Vec::new();
    for i in 0..5 {
        ports.push(store.create_object(&mut tx, "OpticalPort", &format!("p{i}"), AttributeMap::new()).await.unwrap());
    }
    store.commit_tx(tx).await.unwrap();
    for port in &ports {
        pools.move_item_to_pool(&bin.id, port).await.unwrap();
    }

    assert_eq!(pools.items_in_pool(&bin.id, None).await.unwrap(), ports);
    assert_eq!(pools.items_in_pool(&bin.id, Some(2)).await.unwrap(), ports[..2].to_vec());
}

// ============================================================================
// 3. Copy
// ============================================================================

#[tokio::test]
async fn test_copy_recursive_clones_subtree() {
    let inv = Inventory::open_memory();
    let (_, router, board, port) = setup_equipment(&inv).await;
    let pools = inv.pools();
    let lab = pools.create_pool(PoolParent::Root, "Lab", "", "GenericCommunicationsElement", 1).await.unwrap();

    let copy = pools.copy_item_to_pool(&lab.id, &router, true).await.unwrap();
    assert_ne!(copy, router);
    assert_eq!(copy.class_name, "Router");

    let store = inv.store();
    let tx = store.begin_tx(TxMode::ReadOnly).await.unwrap();
    let cloned = store.get_object(&tx, &copy).await.unwrap().unwrap();
    assert_eq!(cloned.get("vendor"), Some("Acme"));

    let h = inv.hierarchy();
    let copied = h.children_recursive(&copy, None).await.unwrap();
    assert_eq!(copied.len(), 2);
    assert_eq!(copied[0].class_name, "IPBoard");
    assert_eq!(copied[1].class_name, "OpticalPort");
    assert_ne!(copied[0], board);
    assert_ne!(copied[1], port);

    // The original is untouched.
    assert_eq!(h.children_recursive(&router, None).await.unwrap(), vec![board, port]);
    assert_eq!(pools.items_in_pool(&lab.id, None).await.unwrap(), vec![copy]);
}

#[tokio::test]
async fn test_copy_non_recursive() {
    let inv = Inventory::open_memory();
    let (_, router, ..) = setup_equipment(&inv).await;
    let pools = inv.pools();
    let lab = pools.create_pool(PoolParent::Root, "Lab", "", "Router", 1).await.unwrap();

    let copy = pools.copy_item_to_pool(&lab.id, &router, false).await.unwrap();
    assert!(inv.hierarchy().children(&copy, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_copy_leaves_store_untouched() {
    let config = EngineConfig { max_traversal_depth: 2, ..EngineConfig::default() };
    let inv = Inventory::with_config(MemoryStore::new(), ClassRegistry::with_core_classes(), config);
    let (_, router, ..) = setup_equipment(&inv).await;
    let pools = inv.pools();
    let lab = pools.create_pool(PoolParent::Root, "Lab", "", "Router", 1).await.unwrap();

    let objects_before = inv.store().object_count();
    let edges_before = inv.store().edge_count();

    let result = pools.copy_item_to_pool(&lab.id, &router, true).await;
    assert!(matches!(result, Err(Error::CycleDetected(_))));
    assert_eq!(inv.store().object_count(), objects_before);
    assert_eq!(inv.store().edge_count(), edges_before);
    assert!(pools.items_in_pool(&lab.id, None).await.unwrap().is_empty());
}
