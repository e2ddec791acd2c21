//! # Pool Hierarchy Resolver
//!
//! Pools are typed administrative containers. They nest under nothing (root
//! pools), under an object, or under another pool, always through a
//! `ChildOfSpecial` edge labeled [`POOL_LABEL`]. Items join a pool the same
//! way.

use hashbrown::HashMap;

use crate::context::Ctx;
use crate::hierarchy::HierarchyResolver;
use crate::model::*;
use crate::schema::ClassHierarchy;
use crate::storage::ObjectStore;
use crate::tx::TxMode;
use crate::{Error, Result};

/// Label of pool membership and pool nesting edges.
pub const POOL_LABEL: &str = "pool";

pub struct PoolResolver<'a, S, C> {
    ctx: Ctx<'a, S, C>,
}

impl<'a, S: ObjectStore, C: ClassHierarchy> PoolResolver<'a, S, C> {
    pub(crate) fn new(ctx: Ctx<'a, S, C>) -> Self {
        Self { ctx }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Pools with no parent. `class_filter` is compared against the pool's
    /// `instances_of_class`, by equality or, with `include_subclasses`, by
    /// inheritance.
    #[tracing::instrument(skip(self))]
    pub async fn root_pools(
        &self,
        class_filter: Option<&str>,
        pool_type: Option<u32>,
        include_subclasses: bool,
    ) -> Result<Vec<Pool>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.root_pools_in(&tx, class_filter, pool_type, include_subclasses).await;
        self.ctx.finish(tx, result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn pools_in_object(&self, parent: &ObjectRef, class_filter: Option<&str>) -> Result<Vec<Pool>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result: Result<Vec<Pool>> = async {
            if !parent.is_business_object() {
                return Err(Error::InvalidArgument(format!("{parent} is not an inventory object")));
            }
            self.ctx.require(&tx, parent).await?;
            self.nested_pools_in(&tx, parent, class_filter).await
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn pools_in_pool(&self, parent_pool_id: &str, class_filter: Option<&str>) -> Result<Vec<Pool>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result: Result<Vec<Pool>> = async {
            let parent = self.pool_in(&tx, parent_pool_id).await?;
            self.nested_pools_in(&tx, &parent.reference(), class_filter).await
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Member objects, never nested pools.
    #[tracing::instrument(skip(self))]
    pub async fn items_in_pool(&self, pool_id: &str, limit: Option<usize>) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result: Result<Vec<ObjectRef>> = async {
            let pool = self.pool_in(&tx, pool_id).await?;
            let edges = self.ctx.store
                .get_edges(&tx, &pool.reference(), Direction::Incoming, Some(EdgeKind::ChildOfSpecial), Some(POOL_LABEL))
                .await?;
            Ok(edges
                .into_iter()
                .map(|e| e.src)
                .filter(ObjectRef::is_business_object)
                .take(limit.unwrap_or(usize::MAX))
                .collect())
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    pub async fn pool(&self, pool_id: &str) -> Result<Pool> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.pool_in(&tx, pool_id).await;
        self.ctx.finish(tx, result).await
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    #[tracing::instrument(skip(self))]
    pub async fn create_pool(
        &self,
        parent: PoolParent,
        name: &str,
        description: &str,
        instances_of_class: &str,
        pool_type: u32,
    ) -> Result<Pool> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<Pool> = async {
            self.ctx.classes.get_class(instances_of_class)?;
            let parent_ref = match &parent {
                PoolParent::Root => None,
                PoolParent::Object(obj) => {
                    if !obj.is_business_object() {
                        return Err(Error::InvalidArgument(format!("{obj} can not own pools")));
                    }
                    self.ctx.require(&tx, obj).await?;
                    Some(obj.clone())
                }
                PoolParent::Pool(id) => Some(self.pool_in(&tx, id).await?.reference()),
            };

            let pool = self.ctx.store.create_pool(&mut tx, Pool {
                id: String::new(),
                name: name.to_owned(),
                description: description.to_owned(),
                instances_of_class: instances_of_class.to_owned(),
                pool_type,
            }).await?;
            if let Some(parent_ref) = parent_ref {
                self.ctx.store
                    .put_edge(&mut tx, EdgeKind::ChildOfSpecial, Some(POOL_LABEL), &pool.reference(), &parent_ref, PropertyMap::new())
                    .await?;
            }
            Ok(pool)
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Make `item` a member of the pool, leaving its previous parent.
    #[tracing::instrument(skip(self))]
    pub async fn move_item_to_pool(&self, pool_id: &str, item: &ObjectRef) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<()> = async {
            let pool = self.accepting_pool(&tx, pool_id, item).await?;
            let current = self.ctx.store.get_edges(&tx, item, Direction::Outgoing, None, None).await?;
            for edge in current {
                let is_parent_edge = edge.kind == EdgeKind::ChildOf
                    || (edge.kind == EdgeKind::ChildOfSpecial && edge.has_label(POOL_LABEL));
                if is_parent_edge {
                    self.ctx.store.delete_edge(&mut tx, edge.id).await?;
                }
            }
            self.ctx.store
                .put_edge(&mut tx, EdgeKind::ChildOfSpecial, Some(POOL_LABEL), item, &pool.reference(), PropertyMap::new())
                .await?;
            Ok(())
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    /// Clone `item` into the pool. With `recursive`, the standard subtree
    /// under it is cloned too and wired to the copies. All or nothing.
    #[tracing::instrument(skip(self))]
    pub async fn copy_item_to_pool(&self, pool_id: &str, item: &ObjectRef, recursive: bool) -> Result<ObjectRef> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result: Result<ObjectRef> = async {
            let pool = self.accepting_pool(&tx, pool_id, item).await?;
            let copy = self.clone_object(&mut tx, item).await?;
            self.ctx.store
                .put_edge(&mut tx, EdgeKind::ChildOfSpecial, Some(POOL_LABEL), &copy, &pool.reference(), PropertyMap::new())
                .await?;
            if recursive {
                self.clone_subtree(&mut tx, item, &copy).await?;
            }
            Ok(copy)
        }
        .await;
        self.ctx.finish(tx, result).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn pool_in(&self, tx: &S::Tx, pool_id: &str) -> Result<Pool> {
        self.ctx.store
            .get_pool(tx, pool_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Pool {pool_id}")))
    }

    async fn root_pools_in(
        &self,
        tx: &S::Tx,
        class_filter: Option<&str>,
        pool_type: Option<u32>,
        include_subclasses: bool,
    ) -> Result<Vec<Pool>> {
        let mut result = Vec::new();
        for pool in self.ctx.store.pools(tx).await? {
            if pool_type.is_some_and(|t| t != pool.pool_type) {
                continue;
            }
            let has_parent = self.ctx.store
                .has_edge(tx, &pool.reference(), Direction::Outgoing, EdgeKind::ChildOfSpecial, Some(POOL_LABEL))
                .await?;
            if has_parent {
                continue;
            }
            let class_ok = match class_filter {
                None => true,
                Some(class) if include_subclasses => {
                    self.ctx.classes.is_subclass_of(&pool.instances_of_class, class)?
                }
                Some(class) => pool.instances_of_class == class,
            };
            if class_ok {
                result.push(pool);
            }
        }
        Ok(result)
    }

    async fn nested_pools_in(&self, tx: &S::Tx, parent: &ObjectRef, class_filter: Option<&str>) -> Result<Vec<Pool>> {
        let edges = self.ctx.store
            .get_edges(tx, parent, Direction::Incoming, Some(EdgeKind::ChildOfSpecial), Some(POOL_LABEL))
            .await?;
        let mut result = Vec::new();
        for edge in edges.into_iter().filter(|e| e.src.is_pool()) {
            let pool = self.pool_in(tx, &edge.src.id).await?;
            if class_filter.is_none_or(|c| pool.instances_of_class == c) {
                result.push(pool);
            }
        }
        Ok(result)
    }

    /// The pool, provided `item` is an instance of its class.
    async fn accepting_pool(&self, tx: &S::Tx, pool_id: &str, item: &ObjectRef) -> Result<Pool> {
        let pool = self.pool_in(tx, pool_id).await?;
        if !item.is_business_object() {
            return Err(Error::InvalidArgument(format!("{item} can not be a pool item")));
        }
        self.ctx.require(tx, item).await?;
        if !self.ctx.is_a(item, &pool.instances_of_class)? {
            return Err(Error::InvalidArgument(format!(
                "Pool {} only holds instances of {}, not {}",
                pool.name, pool.instances_of_class, item.class_name
            )));
        }
        Ok(pool)
    }

    async fn clone_object(&self, tx: &mut S::Tx, source: &ObjectRef) -> Result<ObjectRef> {
        let original = self.ctx.store
            .get_object(tx, source)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Object {source}")))?;
        self.ctx.store
            .create_object(tx, &original.reference.class_name, &original.name, original.attributes)
            .await
    }

    /// Depth-first copy of the standard subtree under `source`, hung from
    /// `copy`.
    async fn clone_subtree(&self, tx: &mut S::Tx, source: &ObjectRef, copy: &ObjectRef) -> Result<()> {
        let hierarchy = HierarchyResolver::new(self.ctx);
        let mut copies: HashMap<ObjectRef, ObjectRef> = HashMap::new();
        copies.insert(source.clone(), copy.clone());

        let mut stack: Vec<(ObjectRef, usize)> = vec![(source.clone(), 0)];
        while let Some((node, depth)) = stack.pop() {
            if depth >= self.ctx.config.max_traversal_depth {
                tracing::error!(item = %source, at = %node, depth, "subtree copy exceeded depth limit");
                return Err(Error::CycleDetected(format!("Subtree of {source} is deeper than the limit")));
            }
            let parent_copy = copies
                .get(&node)
                .cloned()
                .ok_or_else(|| Error::StorageError(format!("No copy recorded for {node}")))?;

            let mut children = hierarchy.children_in(tx, &node, EdgeKind::ChildOf).await?;
            children.reverse();
            for child in children {
                if copies.contains_key(&child) {
                    continue;
                }
                let child_copy = self.clone_object(tx, &child).await?;
                self.ctx.store
                    .put_edge(tx, EdgeKind::ChildOf, None, &child_copy, &parent_copy, PropertyMap::new())
                    .await?;
                copies.insert(child.clone(), child_copy);
                stack.push((child, depth + 1));
            }
        }
        tracing::debug!(item = %source, copied = copies.len(), "subtree copied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Inventory;

    #[tokio::test]
    async fn test_root_pool_filters() {
        let inv = Inventory::open_memory();
        let pools = inv.pools();
        pools.create_pool(PoolParent::Root, "Ports", "", "GenericPort", 1).await.unwrap();
        pools.create_pool(PoolParent::Root, "Optics", "", "OpticalPort", 1).await.unwrap();
        pools.create_pool(PoolParent::Root, "Routers", "", "Router", 2).await.unwrap();

        let exact = pools.root_pools(Some("GenericPort"), None, false).await.unwrap();
        assert_eq!(exact.len(), 1);
        let family = pools.root_pools(Some("GenericPort"), None, true).await.unwrap();
        assert_eq!(family.len(), 2);
        let typed = pools.root_pools(None, Some(2), false).await.unwrap();
        assert_eq!(typed[0].name, "Routers");
    }

    #[tokio::test]
    async fn test_nested_pool_is_not_root() {
        let inv = Inventory::open_memory();
        let pools = inv.pools();
        let outer = pools.create_pool(PoolParent::Root, "Outer", "", "Router", 1).await.unwrap();
        let inner = pools.create_pool(PoolParent::Pool(outer.id.clone()), "Inner", "", "Router", 1).await.unwrap();

        assert_eq!(pools.root_pools(None, None, false).await.unwrap(), vec![outer.clone()]);
        assert_eq!(pools.pools_in_pool(&outer.id, None).await.unwrap(), vec![inner]);
        assert!(pools.items_in_pool(&outer.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_pool() {
        let inv = Inventory::open_memory();
        assert!(matches!(inv.pools().pool("pool-99").await, Err(Error::NotFound(_))));
        assert!(matches!(inv.pools().pools_in_pool("pool-99", None).await, Err(Error::NotFound(_))));
    }
}
