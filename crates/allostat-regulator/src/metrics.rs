//! Regulation performance metrics

use std::collections::BTreeMap;

use allostat_common::{ActionType, InternalState, RegulationResult, Setpoint, Variable};
use serde::{Deserialize, Serialize};

/// Summary returned by [`Regulator::get_metrics`](crate::Regulator::get_metrics)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegulationMetrics {
    /// Completed regulation cycles
    pub regulation_count: u64,
    /// Fraction of cycles marked successful
    pub success_rate: f64,
    /// Mean lead time of actions (ms); reactive actions count as zero
    pub average_anticipation_ms: f64,
    /// Current distance from each setpoint target
    pub per_variable_deviation: BTreeMap<Variable, f64>,
    /// Dispatched actions by type
    pub action_type_histogram: BTreeMap<ActionType, u64>,
}

/// Running totals across every completed cycle
#[derive(Debug, Clone, Default)]
pub struct RegulationLedger {
    count: u64,
    successes: u64,
    anticipation_total_ms: u64,
    histogram: BTreeMap<ActionType, u64>,
}

impl RegulationLedger {
    pub fn record(&mut self, result: &RegulationResult) {
        self.count += 1;
        if result.success {
            self.successes += 1;
        }
        self.anticipation_total_ms += result.action.lead_time_ms;
        *self.histogram.entry(result.action.action_type).or_insert(0) += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn snapshot(&self, state: &InternalState, setpoints: &[Setpoint]) -> RegulationMetrics {
        let (success_rate, average_anticipation_ms) = if self.count == 0 {
            (0.0, 0.0)
        } else {
            (
                self.successes as f64 / self.count as f64,
                self.anticipation_total_ms as f64 / self.count as f64,
            )
        };

        RegulationMetrics {
            regulation_count: self.count,
            success_rate,
            average_anticipation_ms,
            per_variable_deviation: setpoints
                .iter()
                .map(|sp| (sp.variable, sp.deviation(state.get(sp.variable))))
                .collect(),
            action_type_histogram: self.histogram.clone(),
        }
    }
}
