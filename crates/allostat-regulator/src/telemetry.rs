//! Prometheus metrics for the regulation loop

use allostat_common::{ActionType, InternalState, Variable};
use prometheus::{GaugeVec, IntCounter, IntCounterVec, Opts, Registry};

/// Prometheus metrics for the regulator
pub struct RegulatorTelemetry {
    pub cycles_total: IntCounter,
    pub cycles_rejected_total: IntCounter,
    pub actuator_failures_total: IntCounter,
    pub sensor_failures_total: IntCounter,
    pub actions_total: IntCounterVec,
    pub variable_value: GaugeVec,
}

impl RegulatorTelemetry {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            cycles_total: IntCounter::new(
                "allostat_regulation_cycles_total",
                "Completed regulation cycles",
            )?,
            cycles_rejected_total: IntCounter::new(
                "allostat_regulation_cycles_rejected_total",
                "Regulation calls dropped while a cycle was in flight",
            )?,
            actuator_failures_total: IntCounter::new(
                "allostat_actuator_failures_total",
                "Actuator dispatch failures",
            )?,
            sensor_failures_total: IntCounter::new(
                "allostat_sensor_failures_total",
                "Sensor reads discarded by the fault boundary",
            )?,
            actions_total: IntCounterVec::new(
                Opts::new("allostat_actions_total", "Dispatched actions by type"),
                &["action_type"],
            )?,
            variable_value: GaugeVec::new(
                Opts::new("allostat_variable_value", "Latest sensed value per variable"),
                &["variable"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.cycles_total.clone()))?;
        registry.register(Box::new(self.cycles_rejected_total.clone()))?;
        registry.register(Box::new(self.actuator_failures_total.clone()))?;
        registry.register(Box::new(self.sensor_failures_total.clone()))?;
        registry.register(Box::new(self.actions_total.clone()))?;
        registry.register(Box::new(self.variable_value.clone()))?;
        Ok(())
    }

    pub(crate) fn observe_state(&self, state: &InternalState) {
        for variable in Variable::ALL {
            self.variable_value
                .with_label_values(&[variable.as_str()])
                .set(state.get(variable));
        }
    }

    pub(crate) fn observe_action(&self, action_type: ActionType) {
        self.actions_total
            .with_label_values(&[action_type.as_str()])
            .inc();
    }
}
