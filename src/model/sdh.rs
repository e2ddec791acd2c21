//! SDH multiplexing DTOs.

use serde::{Deserialize, Serialize};
use super::ObjectRef;

/// Edge property holding the byte/time-slot a container occupies.
pub const SDH_POSITION: &str = "sdhPosition";

/// A container multiplexed onto a carrier, with the positions it takes there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPositionEntry {
    pub container: ObjectRef,
    /// True when the container is subdivided further instead of delivering a
    /// single tributary link.
    pub structured: bool,
    /// The carrier these positions refer to.
    pub carrier: ObjectRef,
    /// Occupied positions on `carrier`, ascending.
    pub positions: Vec<u32>,
}
