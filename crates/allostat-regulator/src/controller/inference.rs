//! Active inference controller
//!
//! Scores candidate actions by expected free energy (EFE) against a table of
//! preferred values and picks the minimizer.
//!
//! ## Objective
//!
//! ```text
//! pragmatic  = Σ_p precision_p · [(x_p - target_p)² - (x̂_p - target_p)²]
//! epistemic  = (1 - mean confidence) · informativeness(action)
//! ambiguity  = mean(1 - confidence_i)
//! risk       = std_dev(confidence_i)
//! total      = -pragmatic - epistemic + ambiguity + risk
//! ```
//!
//! where `x̂_p` is the clamped post-action estimate from the sensitivity table.

use allostat_common::{Action, BoundedMap, InternalState, Prediction, SetpointError, Variable};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sensitivity::{estimated_post_action, informativeness};

/// Preferred value and its importance weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub target: f64,
    pub precision: f64,
}

/// The four EFE components of one candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedFreeEnergy {
    pub pragmatic_value: f64,
    pub epistemic_value: f64,
    pub ambiguity: f64,
    pub risk: f64,
}

impl ExpectedFreeEnergy {
    /// Scalar objective, lower is better
    #[inline]
    pub fn total(&self) -> f64 {
        -self.pragmatic_value - self.epistemic_value + self.ambiguity + self.risk
    }
}

/// Candidate paired with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAction {
    pub action: Action,
    pub efe: ExpectedFreeEnergy,
}

/// Confidence statistics over a forecast horizon
#[derive(Debug, Clone, Copy, PartialEq)]
struct ConfidenceStats {
    mean: f64,
    ambiguity: f64,
    std_dev: f64,
}

impl ConfidenceStats {
    /// An empty horizon carries no uncertainty
    fn of(predictions: &[Prediction]) -> Self {
        if predictions.is_empty() {
            return Self {
                mean: 1.0,
                ambiguity: 0.0,
                std_dev: 0.0,
            };
        }
        let n = predictions.len() as f64;
        let mean = predictions.iter().map(|p| p.confidence).sum::<f64>() / n;
        let ambiguity = predictions.iter().map(|p| 1.0 - p.confidence).sum::<f64>() / n;
        let variance = predictions
            .iter()
            .map(|p| (p.confidence - mean).powi(2))
            .sum::<f64>()
            / n;
        Self {
            mean,
            ambiguity,
            std_dev: variance.sqrt(),
        }
    }
}

/// EFE-minimizing action selector
pub struct ActiveInferenceController {
    preferences: BoundedMap<Variable, Preference>,
}

impl ActiveInferenceController {
    pub fn new(capacity: usize) -> Self {
        Self {
            preferences: BoundedMap::with_capacity(capacity),
        }
    }

    /// Record a preferred value; the oldest preference is evicted on overflow
    ///
    /// A non-finite target or a negative or non-finite precision is rejected
    /// and leaves the table unchanged.
    pub fn set_preference(
        &mut self,
        variable: Variable,
        target: f64,
        precision: f64,
    ) -> Result<(), SetpointError> {
        if !target.is_finite() {
            return Err(SetpointError::InvalidTarget { variable, target });
        }
        if !precision.is_finite() || precision < 0.0 {
            return Err(SetpointError::InvalidPrecision {
                variable,
                precision,
            });
        }
        self.preferences
            .insert(variable, Preference { target, precision });
        Ok(())
    }

    pub fn preference(&self, variable: Variable) -> Option<Preference> {
        self.preferences.get(&variable).copied()
    }

    /// Snapshot of the preference table in insertion order
    pub fn preferences(&self) -> Vec<(Variable, Preference)> {
        self.preferences.iter().map(|(v, p)| (*v, *p)).collect()
    }

    pub fn calculate_efe(
        &self,
        action: &Action,
        state: &InternalState,
        predictions: &[Prediction],
    ) -> ExpectedFreeEnergy {
        let pragmatic_value = self
            .preferences
            .iter()
            .map(|(&variable, preference)| {
                let current = state.get(variable);
                let post = estimated_post_action(
                    action.action_type,
                    action.magnitude,
                    variable,
                    current,
                );
                let before = (current - preference.target).powi(2);
                let after = (post - preference.target).powi(2);
                preference.precision * (before - after)
            })
            .sum();

        let stats = ConfidenceStats::of(predictions);

        ExpectedFreeEnergy {
            pragmatic_value,
            epistemic_value: (1.0 - stats.mean) * informativeness(action.action_type),
            ambiguity: stats.ambiguity,
            risk: stats.std_dev,
        }
    }

    /// Score every candidate, preserving candidate order
    pub fn score(
        &self,
        candidates: &[Action],
        state: &InternalState,
        predictions: &[Prediction],
    ) -> Vec<ScoredAction> {
        candidates
            .iter()
            .map(|action| ScoredAction {
                action: action.clone(),
                efe: self.calculate_efe(action, state, predictions),
            })
            .collect()
    }

    /// The candidate with the lowest total EFE; ties keep the earlier candidate
    pub fn select_action(
        &self,
        candidates: &[Action],
        state: &InternalState,
        predictions: &[Prediction],
    ) -> Option<Action> {
        let best = self
            .score(candidates, state, predictions)
            .into_iter()
            .reduce(|best, next| {
                if next.efe.total().total_cmp(&best.efe.total()).is_lt() {
                    next
                } else {
                    best
                }
            })?;

        debug!(
            action = %best.action.action_type,
            efe = best.efe.total(),
            candidates = candidates.len(),
            "Action selected"
        );
        Some(best.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allostat_common::ActionType;

    use crate::anticipation::step_confidence;

    fn horizon(steps: usize) -> Vec<Prediction> {
        (0..steps)
            .map(|step| Prediction {
                state: Default::default(),
                timestamp: step as i64 * 1000,
                confidence: step_confidence(step),
                based_on: vec![],
            })
            .collect()
    }

    fn controller() -> ActiveInferenceController {
        let mut controller = ActiveInferenceController::new(16);
        controller
            .set_preference(Variable::ComputationalLoad, 0.5, 2.0)
            .unwrap();
        controller.set_preference(Variable::Energy, 0.7, 1.0).unwrap();
        controller
    }

    #[test]
    fn test_pragmatic_value_rewards_progress() {
        let controller = controller();
        let state = InternalState::default()
            .with(Variable::ComputationalLoad, 0.95)
            .with(Variable::Energy, 0.7);
        let throttle = Action::new(
            ActionType::Throttle,
            Variable::ComputationalLoad,
            1.0,
            1.0,
            "load",
        );
        let efe = controller.calculate_efe(&throttle, &state, &horizon(10));
        assert!(efe.pragmatic_value > 0.0);

        let scale_down =
            Action::new(ActionType::ScaleDown, Variable::MemoryPressure, 1.0, 1.0, "mem");
        let efe = controller.calculate_efe(&scale_down, &state, &horizon(10));
        assert!(efe.pragmatic_value < 0.0);
    }

    #[test]
    fn test_uncertainty_components() {
        let controller = controller();
        let state = InternalState::default();
        let alert = Action::new(ActionType::Alert, Variable::ErrorRate, 0.5, 0.5, "errors");
        let predictions = horizon(10);
        let efe = controller.calculate_efe(&alert, &state, &predictions);

        // confidences 1.0, 0.95, ..., 0.55 → mean 0.775
        assert!((efe.ambiguity - 0.225).abs() < 1e-9);
        assert!((efe.epistemic_value - 0.225).abs() < 1e-9);
        assert!(efe.risk > 0.0);
        assert_eq!(efe.pragmatic_value, 0.0);
    }

    #[test]
    fn test_empty_horizon_has_no_uncertainty() {
        let controller = controller();
        let alert = Action::new(ActionType::Alert, Variable::ErrorRate, 0.5, 0.5, "errors");
        let efe = controller.calculate_efe(&alert, &InternalState::default(), &[]);
        assert_eq!(efe.ambiguity, 0.0);
        assert_eq!(efe.risk, 0.0);
        assert_eq!(efe.epistemic_value, 0.0);
    }

    #[test]
    fn test_select_from_empty_is_none() {
        let controller = controller();
        assert!(controller
            .select_action(&[], &InternalState::default(), &horizon(10))
            .is_none());
    }

    #[test]
    fn test_singleton_is_always_selected() {
        let controller = controller();
        let state = InternalState::default();
        for action_type in ActionType::ALL {
            let candidate = Action::new(action_type, Variable::Energy, 0.7, 0.5, "only");
            let selected = controller
                .select_action(std::slice::from_ref(&candidate), &state, &horizon(10))
                .unwrap();
            assert_eq!(selected, candidate);
        }
    }

    #[test]
    fn test_selection_is_drawn_from_candidates() {
        let controller = controller();
        let state = InternalState::default()
            .with(Variable::ComputationalLoad, 0.9)
            .with(Variable::Energy, 0.25);
        let candidates = vec![
            Action::new(ActionType::Throttle, Variable::ComputationalLoad, 0.5, 0.9, "load"),
            Action::new(ActionType::Hibernate, Variable::Energy, 0.75, 0.75, "energy"),
            Action::new(ActionType::Defer, Variable::Energy, 0.2, 0.6, "need"),
        ];
        let selected = controller
            .select_action(&candidates, &state, &horizon(10))
            .unwrap();
        assert!(candidates.iter().any(|c| c.id == selected.id));
    }

    #[test]
    fn test_preference_table_is_bounded() {
        let mut controller = ActiveInferenceController::new(3);
        for variable in Variable::ALL {
            controller.set_preference(variable, 0.5, 1.0).unwrap();
        }
        assert_eq!(controller.preferences().len(), 3);
        assert!(controller.preference(Variable::Energy).is_none());
        assert!(controller.preference(Variable::QueueDepth).is_some());
    }

    #[test]
    fn test_rejects_invalid_preference() {
        let mut controller = controller();
        let before = controller.preferences();

        let err = controller
            .set_preference(Variable::Latency, f64::NAN, 1.0)
            .unwrap_err();
        assert!(matches!(err, SetpointError::InvalidTarget { .. }));
        let err = controller
            .set_preference(Variable::Latency, 0.2, -1.0)
            .unwrap_err();
        assert!(matches!(err, SetpointError::InvalidPrecision { .. }));
        assert!(controller
            .set_preference(Variable::Latency, 0.2, f64::INFINITY)
            .is_err());

        assert_eq!(controller.preferences(), before);
    }
}
