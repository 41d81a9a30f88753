use cxxgraph_core::config::ResolutionMode;
use serde::{Deserialize, Serialize};

/// Outcome counters of one resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub mode: ResolutionMode,
    pub exact: usize,
    pub qualified_suffix: usize,
    pub base_name: usize,
    pub namespace_hint: usize,
    pub scored: usize,
    pub rejected_low_confidence: usize,
    pub rejected_ties: usize,
    pub remaining_missing: usize,
}

impl ResolutionStats {
    pub fn new(mode: ResolutionMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn resolved(&self) -> usize {
        self.exact + self.qualified_suffix + self.base_name + self.namespace_hint + self.scored
    }

    /// Share of missing names resolved, 0.0 when nothing was missing.
    pub fn resolution_rate(&self) -> f64 {
        let total = self.resolved() + self.remaining_missing;
        if total == 0 {
            0.0
        } else {
            self.resolved() as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_counts_every_strategy() {
        let stats = ResolutionStats {
            exact: 1,
            base_name: 2,
            scored: 1,
            remaining_missing: 4,
            ..ResolutionStats::new(ResolutionMode::Full)
        };
        assert_eq!(stats.resolved(), 4);
        assert!((stats.resolution_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(ResolutionStats::default().resolution_rate(), 0.0);
    }
}
