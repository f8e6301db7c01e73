use std::collections::HashMap;

use pxi_core::DiscoveredRegime;

/// Per-process continuity owned exclusively by the scheduler. Survives
/// only within the scheduler's lifetime; on cold start nothing is here,
/// so no pxi_change alert fires until the second successful tick.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub previous_pxi: Option<f64>,
    pub previous_raw_values: HashMap<String, f64>,
    pub previous_regime: Option<DiscoveredRegime>,
}
