//! Candidate action generation
//!
//! Reactive candidates come from fixed triggers on the current snapshot;
//! anticipatory candidates come from confident future needs.

use allostat_common::{Action, ActionType, FutureNeed, InternalState, NeedDirection, Variable};
use tracing::debug;

/// Trigger thresholds for candidate generation
#[derive(Debug, Clone)]
pub struct CandidateRules {
    /// Throttle above this computational load
    pub load_ceiling: f64,
    /// Hibernate below this energy
    pub energy_floor: f64,
    /// Scale down above this memory pressure
    pub memory_ceiling: f64,
    /// Alert above this error rate
    pub error_ceiling: f64,
    /// Ignore needs at or below this confidence
    pub confidence_threshold: f64,
    /// Horizon used to turn a need's lead time into urgency
    pub urgency_horizon_ms: u64,
}

impl Default for CandidateRules {
    fn default() -> Self {
        Self {
            load_ceiling: 0.8,
            energy_floor: 0.3,
            memory_ceiling: 0.8,
            error_ceiling: 0.2,
            confidence_threshold: 0.5,
            urgency_horizon_ms: 10_000,
        }
    }
}

/// Proposes a small set of discrete actions per cycle
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator {
    rules: CandidateRules,
}

impl CandidateGenerator {
    pub fn new(rules: CandidateRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &CandidateRules {
        &self.rules
    }

    pub fn generate(&self, state: &InternalState, needs: &[FutureNeed]) -> Vec<Action> {
        let mut candidates = self.reactive(state);
        candidates.extend(self.anticipatory(needs));
        debug!(count = candidates.len(), "Candidates generated");
        candidates
    }

    fn reactive(&self, state: &InternalState) -> Vec<Action> {
        let rules = &self.rules;
        let mut candidates = Vec::new();

        if state.computational_load > rules.load_ceiling {
            let excess = (state.computational_load - rules.load_ceiling)
                / (1.0 - rules.load_ceiling).max(f64::EPSILON);
            candidates.push(Action::new(
                ActionType::Throttle,
                Variable::ComputationalLoad,
                excess.max(0.25),
                state.computational_load,
                format!(
                    "computational load {:.2} above {:.2}",
                    state.computational_load, rules.load_ceiling
                ),
            ));
        }

        if state.energy < rules.energy_floor {
            candidates.push(Action::new(
                ActionType::Hibernate,
                Variable::Energy,
                1.0 - state.energy,
                1.0 - state.energy,
                format!("energy {:.2} below {:.2}", state.energy, rules.energy_floor),
            ));
        }

        if state.memory_pressure > rules.memory_ceiling {
            candidates.push(Action::new(
                ActionType::ScaleDown,
                Variable::MemoryPressure,
                (state.memory_pressure - 0.5).max(0.1),
                state.memory_pressure,
                format!(
                    "memory pressure {:.2} above {:.2}",
                    state.memory_pressure, rules.memory_ceiling
                ),
            ));
        }

        if state.error_rate > rules.error_ceiling {
            candidates.push(Action::new(
                ActionType::Alert,
                Variable::ErrorRate,
                state.error_rate,
                (state.error_rate * 2.0).min(1.0),
                format!("error rate {:.2} above {:.2}", state.error_rate, rules.error_ceiling),
            ));
        }

        candidates
    }

    fn anticipatory(&self, needs: &[FutureNeed]) -> Vec<Action> {
        needs
            .iter()
            .filter(|need| need.confidence > self.rules.confidence_threshold)
            .filter(|need| need.direction == NeedDirection::Deficit)
            .filter_map(|need| {
                let action_type = match need.resource {
                    Variable::Energy => ActionType::Defer,
                    Variable::MemoryPressure => ActionType::Preload,
                    _ => return None,
                };
                let urgency = match action_type {
                    ActionType::Defer => {
                        1.0 - need.time_horizon_ms as f64 / self.rules.urgency_horizon_ms as f64
                    }
                    _ => need.confidence * 0.5,
                };
                Some(
                    Action::new(
                        action_type,
                        need.resource,
                        need.amount,
                        urgency,
                        format!(
                            "{} forecast {:.2} in {}ms (target {:.2})",
                            need.resource, need.predicted_value, need.time_horizon_ms, need.target
                        ),
                    )
                    .with_lead_time(need.time_horizon_ms),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn need(
        resource: Variable,
        direction: NeedDirection,
        horizon: u64,
        confidence: f64,
    ) -> FutureNeed {
        FutureNeed {
            resource,
            amount: 0.2,
            time_horizon_ms: horizon,
            confidence,
            source: "test".into(),
            direction,
            predicted_value: 0.3,
            target: 0.7,
        }
    }

    fn nominal() -> InternalState {
        InternalState::default()
            .with(Variable::Energy, 0.7)
            .with(Variable::ComputationalLoad, 0.5)
            .with(Variable::MemoryPressure, 0.5)
            .with(Variable::ErrorRate, 0.0)
    }

    #[test]
    fn test_nominal_state_yields_nothing() {
        let generator = CandidateGenerator::default();
        assert!(generator.generate(&nominal(), &[]).is_empty());
    }

    #[test]
    fn test_reactive_triggers() {
        let generator = CandidateGenerator::default();
        let state = nominal()
            .with(Variable::ComputationalLoad, 0.95)
            .with(Variable::Energy, 0.1)
            .with(Variable::MemoryPressure, 0.9)
            .with(Variable::ErrorRate, 0.4);
        let types: Vec<ActionType> = generator
            .generate(&state, &[])
            .iter()
            .map(|a| a.action_type)
            .collect();
        assert_eq!(
            types,
            vec![
                ActionType::Throttle,
                ActionType::Hibernate,
                ActionType::ScaleDown,
                ActionType::Alert
            ]
        );
    }

    #[test]
    fn test_energy_deficit_defers_with_urgency() {
        let generator = CandidateGenerator::default();
        let needs = [need(Variable::Energy, NeedDirection::Deficit, 3000, 0.9)];
        let candidates = generator.generate(&nominal(), &needs);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].action_type, ActionType::Defer);
        assert!((candidates[0].urgency - 0.7).abs() < 1e-9);
        assert_eq!(candidates[0].lead_time_ms, 3000);
    }

    #[test]
    fn test_memory_deficit_preloads() {
        let generator = CandidateGenerator::default();
        let needs = [need(Variable::MemoryPressure, NeedDirection::Deficit, 5000, 0.8)];
        let candidates = generator.generate(&nominal(), &needs);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].action_type, ActionType::Preload);
    }

    #[test]
    fn test_low_confidence_and_surplus_needs_are_ignored() {
        let generator = CandidateGenerator::default();
        let needs = [
            need(Variable::Energy, NeedDirection::Deficit, 9000, 0.5),
            need(Variable::Energy, NeedDirection::Surplus, 1000, 0.95),
            need(Variable::Latency, NeedDirection::Deficit, 1000, 0.95),
        ];
        assert!(generator.generate(&nominal(), &needs).is_empty());
    }
}
