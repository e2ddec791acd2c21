//! # Containment Hierarchy Resolver
//!
//! Parent, ancestor and descendant queries over the standard (`ChildOf`)
//! and special (`ChildOfSpecial`) containment trees.
//!
//! A standard parent always wins over a special one. Objects with neither
//! hang from the implicit root, [`ObjectRef::root`].

use hashbrown::HashSet;

use crate::context::Ctx;
use crate::model::*;
use crate::schema::ClassHierarchy;
use crate::storage::ObjectStore;
use crate::tx::TxMode;
use crate::{Error, Result};

pub struct HierarchyResolver<'a, S, C> {
    ctx: Ctx<'a, S, C>,
}

impl<'a, S: ObjectStore, C: ClassHierarchy> HierarchyResolver<'a, S, C> {
    pub(crate) fn new(ctx: Ctx<'a, S, C>) -> Self {
        Self { ctx }
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Standard parent, else special parent, else the root. `None` only for
    /// the root itself.
    #[tracing::instrument(skip(self))]
    pub async fn parent(&self, obj: &ObjectRef) -> Result<Option<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.parent_in(&tx, obj).await;
        self.ctx.finish(tx, result).await
    }

    /// The `ChildOf` parent, or the root when there is none.
    pub async fn standard_parent(&self, obj: &ObjectRef) -> Result<Option<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.typed_parent_in(&tx, obj, EdgeKind::ChildOf).await;
        let result = result.map(|p| match p {
            Some(p) => Some(p),
            None if obj.is_root() => None,
            None => Some(ObjectRef::root()),
        });
        self.ctx.finish(tx, result).await
    }

    /// The `ChildOfSpecial` parent, if any (a pool or the owner of a
    /// special child).
    pub async fn special_parent(&self, obj: &ObjectRef) -> Result<Option<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.typed_parent_in(&tx, obj, EdgeKind::ChildOfSpecial).await;
        self.ctx.finish(tx, result).await
    }

    /// Ancestors nearest first. The last element is always the root.
    #[tracing::instrument(skip(self))]
    pub async fn ancestors(&self, obj: &ObjectRef) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.ancestors_in(&tx, obj).await;
        self.ctx.finish(tx, result).await
    }

    /// Ancestors nearest first, up to and including the first one that is a
    /// `stop_class`. If none is, the chain stops short of the root.
    #[tracing::instrument(skip(self))]
    pub async fn ancestors_until_class(&self, obj: &ObjectRef, stop_class: &str) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.ancestors_until_class_in(&tx, obj, stop_class).await;
        self.ctx.finish(tx, result).await
    }

    /// First ancestor that is a `target_class`, or the root if none is.
    #[tracing::instrument(skip(self))]
    pub async fn first_ancestor_of_class(&self, obj: &ObjectRef, target_class: &str) -> Result<ObjectRef> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.first_ancestor_of_class_in(&tx, obj, target_class).await;
        self.ctx.finish(tx, result).await
    }

    /// Lowest common ancestor. Worst case the root.
    #[tracing::instrument(skip(self))]
    pub async fn common_ancestor(&self, a: &ObjectRef, b: &ObjectRef) -> Result<ObjectRef> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.common_ancestor_in(&tx, a, b).await;
        self.ctx.finish(tx, result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn children(&self, obj: &ObjectRef, filter: Option<&str>) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.filtered_children_in(&tx, obj, EdgeKind::ChildOf, filter).await;
        self.ctx.finish(tx, result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn special_children(&self, obj: &ObjectRef, filter: Option<&str>) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.filtered_children_in(&tx, obj, EdgeKind::ChildOfSpecial, filter).await;
        self.ctx.finish(tx, result).await
    }

    /// Depth-first standard descendants. The filter selects results, it does
    /// not prune the descent.
    #[tracing::instrument(skip(self))]
    pub async fn children_recursive(&self, obj: &ObjectRef, filter: Option<&str>) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.descendants_in(&tx, obj, EdgeKind::ChildOf, filter).await;
        self.ctx.finish(tx, result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn special_children_recursive(&self, obj: &ObjectRef, filter: Option<&str>) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.descendants_in(&tx, obj, EdgeKind::ChildOfSpecial, filter).await;
        self.ctx.finish(tx, result).await
    }

    /// Children of the parent, minus `obj`, over the same kind of edge that
    /// links `obj` to its parent.
    #[tracing::instrument(skip(self))]
    pub async fn siblings(&self, obj: &ObjectRef) -> Result<Vec<ObjectRef>> {
        let tx = self.ctx.store.begin_tx(TxMode::ReadOnly).await?;
        let result = self.siblings_in(&tx, obj).await;
        self.ctx.finish(tx, result).await
    }

    /// Re-parent `objects` under `target` in the standard tree. Moving to the
    /// root just drops the `ChildOf` edge.
    #[tracing::instrument(skip(self))]
    pub async fn move_objects(&self, target: &ObjectRef, objects: &[ObjectRef]) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result = self.move_in(&mut tx, target, objects, EdgeKind::ChildOf).await;
        self.ctx.finish(tx, result).await
    }

    /// Re-parent `objects` under `target` in the special tree.
    #[tracing::instrument(skip(self))]
    pub async fn move_special_objects(&self, target: &ObjectRef, objects: &[ObjectRef]) -> Result<()> {
        let mut tx = self.ctx.store.begin_tx(TxMode::ReadWrite).await?;
        let result = self.move_in(&mut tx, target, objects, EdgeKind::ChildOfSpecial).await;
        self.ctx.finish(tx, result).await
    }

    // ========================================================================
    // Transaction-scoped building blocks (shared with the other resolvers)
    // ========================================================================

    pub(crate) async fn parent_in(&self, tx: &S::Tx, obj: &ObjectRef) -> Result<Option<ObjectRef>> {
        if obj.is_root() {
            return Ok(None);
        }
        self.ctx.require(tx, obj).await?;
        if let Some(parent) = self.typed_parent_in(tx, obj, EdgeKind::ChildOf).await? {
            return Ok(Some(parent));
        }
        if let Some(parent) = self.typed_parent_in(tx, obj, EdgeKind::ChildOfSpecial).await? {
            return Ok(Some(parent));
        }
        Ok(Some(ObjectRef::root()))
    }

    async fn typed_parent_in(&self, tx: &S::Tx, obj: &ObjectRef, kind: EdgeKind) -> Result<Option<ObjectRef>> {
        if obj.is_root() {
            return Ok(None);
        }
        self.ctx.require(tx, obj).await?;
        let edges = self.ctx.store.get_edges(tx, obj, Direction::Outgoing, Some(kind), None).await?;
        Ok(edges.into_iter().next().map(|e| e.dst))
    }

    pub(crate) async fn ancestors_in(&self, tx: &S::Tx, obj: &ObjectRef) -> Result<Vec<ObjectRef>> {
        let mut chain = Vec::new();
        let mut seen: HashSet<ObjectRef> = HashSet::new();
        seen.insert(obj.clone());
        let mut current = obj.clone();

        while let Some(parent) = self.parent_in(tx, &current).await? {
            if parent.is_root() {
                chain.push(parent);
                break;
            }
            if !seen.insert(parent.clone()) || chain.len() >= self.ctx.config.max_traversal_depth {
                tracing::error!(object = %obj, at = %parent, depth = chain.len(), "containment cycle");
                return Err(Error::CycleDetected(format!(
                    "Parent chain of {obj} loops back through {parent}"
                )));
            }
            chain.push(parent.clone());
            current = parent;
        }
        Ok(chain)
    }

    pub(crate) async fn ancestors_until_class_in(
        &self,
        tx: &S::Tx,
        obj: &ObjectRef,
        stop_class: &str,
    ) -> Result<Vec<ObjectRef>> {
        self.ctx.classes.get_class(stop_class)?;
        let mut chain = Vec::new();
        for ancestor in self.ancestors_in(tx, obj).await? {
            if ancestor.is_root() {
                break;
            }
            let stop = self.ctx.is_a(&ancestor, stop_class)?;
            chain.push(ancestor);
            if stop {
                break;
            }
        }
        Ok(chain)
    }

    pub(crate) async fn first_ancestor_of_class_in(
        &self,
        tx: &S::Tx,
        obj: &ObjectRef,
        target_class: &str,
    ) -> Result<ObjectRef> {
        let chain = self.ancestors_until_class_in(tx, obj, target_class).await?;
        match chain.last() {
            Some(last) if self.ctx.is_a(last, target_class)? => Ok(last.clone()),
            _ => Ok(ObjectRef::root()),
        }
    }

    pub(crate) async fn common_ancestor_in(&self, tx: &S::Tx, a: &ObjectRef, b: &ObjectRef) -> Result<ObjectRef> {
        let chain_a = self.lineage(tx, a).await?;
        let chain_b = self.lineage(tx, b).await?;

        let mut common = ObjectRef::root();
        for (x, y) in chain_a.iter().zip(chain_b.iter()) {
            if x != y {
                break;
            }
            common = x.clone();
        }
        Ok(common)
    }

    /// Root-first chain ending with `obj` itself.
    async fn lineage(&self, tx: &S::Tx, obj: &ObjectRef) -> Result<Vec<ObjectRef>> {
        self.ctx.require(tx, obj).await?;
        let mut chain = self.ancestors_in(tx, obj).await?;
        chain.reverse();
        chain.push(obj.clone());
        Ok(chain)
    }

    /// Direct children over `kind`. Special children exclude pool members.
    pub(crate) async fn children_in(&self, tx: &S::Tx, obj: &ObjectRef, kind: EdgeKind) -> Result<Vec<ObjectRef>> {
        if obj.is_root() {
            if kind == EdgeKind::ChildOfSpecial {
                return Ok(Vec::new());
            }
            let mut orphans = Vec::new();
            for object in self.ctx.store.objects(tx).await? {
                let has_parent = self.ctx.store
                    .get_edges(tx, &object.reference, Direction::Outgoing, None, None)
                    .await?
                    .iter()
                    .any(|e| e.kind != EdgeKind::RelatedTo);
                if !has_parent {
                    orphans.push(object.reference);
                }
            }
            return Ok(orphans);
        }

        self.ctx.require(tx, obj).await?;
        let edges = self.ctx.store.get_edges(tx, obj, Direction::Incoming, Some(kind), None).await?;
        Ok(edges
            .into_iter()
            .filter(|e| kind == EdgeKind::ChildOf || e.label.is_none())
            .map(|e| e.src)
            .collect())
    }

    async fn filtered_children_in(
        &self,
        tx: &S::Tx,
        obj: &ObjectRef,
        kind: EdgeKind,
        filter: Option<&str>,
    ) -> Result<Vec<ObjectRef>> {
        if let Some(class) = filter {
            self.ctx.classes.get_class(class)?;
        }
        let mut result = Vec::new();
        for child in self.children_in(tx, obj, kind).await? {
            if self.matches(&child, filter)? {
                result.push(child);
            }
        }
        Ok(result)
    }

    pub(crate) async fn descendants_in(
        &self,
        tx: &S::Tx,
        obj: &ObjectRef,
        kind: EdgeKind,
        filter: Option<&str>,
    ) -> Result<Vec<ObjectRef>> {
        if let Some(class) = filter {
            self.ctx.classes.get_class(class)?;
        }
        let mut result = Vec::new();
        let mut visited: HashSet<ObjectRef> = HashSet::new();
        visited.insert(obj.clone());

        // (node, depth), children pushed in reverse to keep pre-order
        let mut stack: Vec<(ObjectRef, usize)> = Vec::new();
        let mut first = self.children_in(tx, obj, kind).await?;
        first.reverse();
        stack.extend(first.into_iter().map(|c| (c, 1)));

        while let Some((node, depth)) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            if depth > self.ctx.config.max_traversal_depth {
                tracing::error!(object = %obj, at = %node, depth, "descent exceeded depth limit");
                return Err(Error::CycleDetected(format!(
                    "Descendants of {obj} deeper than {}",
                    self.ctx.config.max_traversal_depth
                )));
            }
            if self.matches(&node, filter)? {
                result.push(node.clone());
            }
            let mut children = self.children_in(tx, &node, kind).await?;
            children.reverse();
            stack.extend(children.into_iter().map(|c| (c, depth + 1)));
        }
        Ok(result)
    }

    async fn siblings_in(&self, tx: &S::Tx, obj: &ObjectRef) -> Result<Vec<ObjectRef>> {
        if obj.is_root() {
            return Ok(Vec::new());
        }
        self.ctx.require(tx, obj).await?;

        let up = self.ctx.store.get_edges(tx, obj, Direction::Outgoing, None, None).await?;
        let parent_edge = up
            .iter()
            .find(|e| e.kind == EdgeKind::ChildOf)
            .or_else(|| up.iter().find(|e| e.kind == EdgeKind::ChildOfSpecial));

        let siblings = match parent_edge {
            Some(edge) => self.ctx.store
                .get_edges(tx, &edge.dst, Direction::Incoming, Some(edge.kind), None)
                .await?
                .into_iter()
                .filter(|e| e.label == edge.label)
                .map(|e| e.src)
                .collect(),
            None => self.children_in(tx, &ObjectRef::root(), EdgeKind::ChildOf).await?,
        };
        Ok(siblings.into_iter().filter(|s| s != obj).collect())
    }

    async fn move_in(
        &self,
        tx: &mut S::Tx,
        target: &ObjectRef,
        objects: &[ObjectRef],
        kind: EdgeKind,
    ) -> Result<()> {
        self.ctx.require(tx, target).await?;
        for obj in objects {
            if !obj.is_business_object() {
                return Err(Error::InvalidArgument(format!("{obj} can not be moved")));
            }
            self.ctx.require(tx, obj).await?;
            if obj == target || self.ancestors_in(tx, target).await?.contains(obj) {
                return Err(Error::BusinessConstraintViolation(format!(
                    "{obj} can not be moved under its own descendant {target}"
                )));
            }

            let current = self.ctx.store.get_edges(tx, obj, Direction::Outgoing, Some(kind), None).await?;
            for edge in current.iter().filter(|e| e.label.is_none()) {
                self.ctx.store.delete_edge(tx, edge.id).await?;
            }
            if !target.is_root() {
                self.ctx.store.put_edge(tx, kind, None, obj, target, PropertyMap::new()).await?;
            }
            tracing::debug!(object = %obj, target = %target, ?kind, "object moved");
        }
        Ok(())
    }

    fn matches(&self, obj: &ObjectRef, filter: Option<&str>) -> Result<bool> {
        match filter {
            Some(class) => self.ctx.is_a(obj, class),
            None => Ok(true),
        }
    }
}
