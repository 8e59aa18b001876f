//! Regulation actions and their recorded outcomes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StateError;
use crate::types::prediction::StateValues;
use crate::types::state::Variable;

/// Discrete regulation action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Throttle,
    ScaleUp,
    ScaleDown,
    Defer,
    Preload,
    Hibernate,
    Alert,
    AdaptSetpoint,
}

impl ActionType {
    pub const ALL: [ActionType; 8] = [
        ActionType::Throttle,
        ActionType::ScaleUp,
        ActionType::ScaleDown,
        ActionType::Defer,
        ActionType::Preload,
        ActionType::Hibernate,
        ActionType::Alert,
        ActionType::AdaptSetpoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Throttle => "throttle",
            ActionType::ScaleUp => "scale_up",
            ActionType::ScaleDown => "scale_down",
            ActionType::Defer => "defer",
            ActionType::Preload => "preload",
            ActionType::Hibernate => "hibernate",
            ActionType::Alert => "alert",
            ActionType::AdaptSetpoint => "adapt_setpoint",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StateError::UnknownAction(s.to_string()))
    }
}

/// A proposed or executed regulation action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action ID
    pub id: Uuid,
    /// Action kind
    pub action_type: ActionType,
    /// Variable the action is aimed at
    pub target: Variable,
    /// Strength in [0, 1]
    pub magnitude: f64,
    /// Urgency in [0, 1]
    pub urgency: f64,
    /// Human-readable trigger
    pub reason: String,
    /// How far ahead of the forecast breach the action fires (ms), 0 if reactive
    pub lead_time_ms: u64,
}

impl Action {
    pub fn new(
        action_type: ActionType,
        target: Variable,
        magnitude: f64,
        urgency: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            action_type,
            target,
            magnitude: magnitude.clamp(0.0, 1.0),
            urgency: urgency.clamp(0.0, 1.0),
            reason: reason.into(),
            lead_time_ms: 0,
        }
    }

    /// Mark the action as anticipatory
    pub fn with_lead_time(mut self, lead_time_ms: u64) -> Self {
        self.lead_time_ms = lead_time_ms;
        self
    }

    pub fn is_anticipatory(&self) -> bool {
        self.lead_time_ms > 0
    }
}

/// Outcome of one completed regulation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationResult {
    /// Action that was dispatched
    pub action: Action,
    /// Expected change per variable
    pub predicted_effect: StateValues,
    /// Measured change per variable after the settle delay
    pub actual_effect: StateValues,
    /// Whether the actuator accepted the action
    pub dispatched: bool,
    /// Dispatched and the target did not drift further from its setpoint
    pub success: bool,
    /// Completion timestamp (Unix milliseconds)
    pub completed_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_names_round_trip() {
        for t in ActionType::ALL {
            assert_eq!(t.as_str().parse::<ActionType>(), Ok(t));
        }
        assert!("reboot".parse::<ActionType>().is_err());
    }

    #[test]
    fn test_action_clamps_magnitude_and_urgency() {
        let action = Action::new(
            ActionType::Throttle,
            Variable::ComputationalLoad,
            1.4,
            -1.0,
            "load",
        );
        assert_eq!(action.magnitude, 1.0);
        assert_eq!(action.urgency, 0.0);
        assert!(!action.is_anticipatory());
        assert!(action.with_lead_time(3000).is_anticipatory());
    }
}
