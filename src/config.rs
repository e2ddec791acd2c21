//! Engine limits.

use serde::{Deserialize, Serialize};
use crate::Result;

/// Bounds applied by the resolvers.
///
/// ```json
/// {
///   "max_traversal_depth": 100,
///   "max_route_hops": 30,
///   "max_routes": 50,
///   "max_route_expansions": 100000
/// }
/// ```
///
/// Missing keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest parent chain, descent or physical path walked before the
    /// traversal is reported as a cycle.
    pub max_traversal_depth: usize,
    /// Longest overlay route, in links.
    pub max_route_hops: usize,
    /// Cap on the routes returned by `find_routes`.
    pub max_routes: usize,
    /// Partial routes `find_routes` may expand before giving up.
    pub max_route_expansions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_traversal_depth: 100,
            max_route_hops: 30,
            max_routes: 50,
            max_route_expansions: 100_000,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
