//! # Inventory Graph Model
//!
//! Plain DTOs that cross every boundary: store ↔ resolvers ↔ caller.
//!
//! Design rule: no storage types, no locks, no async here.

pub mod object;
pub mod edge;
pub mod value;
pub mod property_map;
pub mod pool;
pub mod sdh;

pub use object::{InventoryObject, ObjectRef, POOL_CLASS, ROOT_CLASS, ROOT_ID};
pub use edge::{Direction, Edge, EdgeId, EdgeKind};
pub use value::Value;
pub use property_map::{AttributeMap, PropertyMap};
pub use pool::{Pool, PoolParent};
pub use sdh::{ContainerPositionEntry, SDH_POSITION};
