use serde::{Deserialize, Serialize};

/// Execution engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecEngineConfig {
    /// Reconcile each client's mass status when the engine starts
    pub reconciliation: bool,
    /// Ignore venue orders the cache has never seen instead of adopting them
    pub filter_unclaimed_external_orders: bool,
}

impl Default for ExecEngineConfig {
    fn default() -> Self {
        Self {
            reconciliation: true,
            filter_unclaimed_external_orders: false,
        }
    }
}
