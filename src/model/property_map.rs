//! Key-value maps carried by objects and edges.

use std::collections::{BTreeMap, HashMap};
use super::Value;

/// Typed properties on an edge.
pub type PropertyMap = HashMap<String, Value>;

/// String attributes on an inventory object. Ordered so copies and
/// comparisons are deterministic.
pub type AttributeMap = BTreeMap<String, String>;
