//! Borrowed view shared by every resolver.

use crate::config::EngineConfig;
use crate::model::ObjectRef;
use crate::schema::ClassHierarchy;
use crate::storage::ObjectStore;
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

pub(crate) struct Ctx<'a, S, C> {
    pub store: &'a S,
    pub classes: &'a C,
    pub config: &'a EngineConfig,
}

impl<S, C> Clone for Ctx<'_, S, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, C> Copy for Ctx<'_, S, C> {}

impl<'a, S: ObjectStore, C: ClassHierarchy> Ctx<'a, S, C> {
    /// Class test for a node. The root sentinel and pools belong to no
    /// metadata class, so they never match.
    pub fn is_a(&self, obj: &ObjectRef, class: &str) -> Result<bool> {
        if !obj.is_business_object() {
            return Ok(false);
        }
        self.classes.is_subclass_of(&obj.class_name, class)
    }

    pub fn is_any_of(&self, obj: &ObjectRef, classes: &[&str]) -> Result<bool> {
        for class in classes {
            if self.is_a(obj, class)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn require(&self, tx: &S::Tx, obj: &ObjectRef) -> Result<()> {
        if self.store.exists(tx, obj).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Object {obj}")))
        }
    }

    /// Commit on success, roll back on failure, and report the outcome.
    pub async fn finish<T>(&self, tx: S::Tx, result: Result<T>) -> Result<T> {
        let id = tx.id();
        let mode = tx.mode();
        match result {
            Ok(value) => {
                self.store.commit_tx(tx).await.inspect_err(|e| {
                    tracing::warn!(tx = %id, error = %e, "commit rejected");
                })?;
                if mode == TxMode::ReadWrite {
                    tracing::debug!(tx = %id, "mutation committed");
                }
                Ok(value)
            }
            Err(e) => {
                self.store.rollback_tx(tx).await?;
                if mode == TxMode::ReadWrite {
                    tracing::warn!(tx = %id, error = %e, "mutation rolled back");
                }
                Err(e)
            }
        }
    }
}
