//! Expected linear effect of each action type
//!
//! `sensitivity(action, variable)` is the change in `variable` per unit of
//! action magnitude. The same table scores candidates and predicts the effect
//! of the dispatched action.

use allostat_common::{clamp01, ActionType, InternalState, StateValues, Variable};

/// Expected change in `variable` per unit magnitude of `action`
pub fn sensitivity(action: ActionType, variable: Variable) -> f64 {
    use ActionType::*;
    use Variable::*;

    match (action, variable) {
        (Throttle, ComputationalLoad) => -0.3,
        (Throttle, Latency) => 0.1,
        (Throttle, Energy) => 0.1,
        (Throttle, ThermalState) => -0.05,

        (ScaleUp, ComputationalLoad) => -0.2,
        (ScaleUp, Energy) => -0.15,
        (ScaleUp, Latency) => -0.1,
        (ScaleUp, MemoryPressure) => 0.1,
        (ScaleUp, ThermalState) => 0.05,

        (ScaleDown, MemoryPressure) => -0.2,
        (ScaleDown, ComputationalLoad) => 0.1,
        (ScaleDown, Energy) => 0.1,
        (ScaleDown, Latency) => 0.05,

        (Defer, ComputationalLoad) => -0.1,
        (Defer, Latency) => 0.05,
        (Defer, Energy) => 0.05,

        (Preload, MemoryPressure) => 0.15,
        (Preload, Latency) => -0.1,
        (Preload, Energy) => -0.05,

        // recover energy, collapse load toward idle
        (Hibernate, Energy) => 0.5,
        (Hibernate, ComputationalLoad) => -0.2,
        (Hibernate, ThermalState) => -0.1,
        (Hibernate, Latency) => 0.1,

        // alert and adapt_setpoint have no direct state effect
        _ => 0.0,
    }
}

/// How much executing `action` is expected to reveal about the system
pub fn informativeness(action: ActionType) -> f64 {
    match action {
        ActionType::Alert | ActionType::AdaptSetpoint => 1.0,
        ActionType::Preload => 0.5,
        ActionType::ScaleUp => 0.4,
        ActionType::Throttle | ActionType::ScaleDown | ActionType::Defer => 0.3,
        ActionType::Hibernate => 0.1,
    }
}

/// Value of `variable` after applying `action` at `magnitude`
#[inline]
pub fn estimated_post_action(
    action: ActionType,
    magnitude: f64,
    variable: Variable,
    current: f64,
) -> f64 {
    let post = current + sensitivity(action, variable) * magnitude;
    if variable.is_normalized() {
        clamp01(post)
    } else {
        post.max(0.0)
    }
}

/// Predicted per-variable change from applying `action` to `state`
pub fn predicted_effect(action: ActionType, magnitude: f64, state: &InternalState) -> StateValues {
    Variable::NORMALIZED
        .into_iter()
        .filter(|&variable| sensitivity(action, variable) != 0.0)
        .map(|variable| {
            let current = state.get(variable);
            let post = estimated_post_action(action, magnitude, variable, current);
            (variable, post - current)
        })
        .collect()
}
