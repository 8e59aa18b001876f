//! Forecast outputs: predictions and future needs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::state::Variable;

/// Per-variable values, used for partial states and effects
pub type StateValues = BTreeMap<Variable, f64>;

/// Lowest confidence a forecast step may carry
pub const CONFIDENCE_FLOOR: f64 = 0.3;

/// Forecast of the state at one future instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted value per variable
    pub state: StateValues,
    /// Instant the prediction refers to (Unix milliseconds)
    pub timestamp: i64,
    /// Confidence in [CONFIDENCE_FLOOR, 1]
    pub confidence: f64,
    /// Tags naming the evidence the forecast was derived from
    pub based_on: Vec<String>,
}

impl Prediction {
    pub fn value(&self, variable: Variable) -> Option<f64> {
        self.state.get(&variable).copied()
    }
}

/// Side of the tolerance band a forecast leaves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedDirection {
    /// Forecast falls below `target - tolerance`
    Deficit,
    /// Forecast rises above `target + tolerance`
    Surplus,
}

/// Expected setpoint breach inside the forecast horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureNeed {
    /// Variable expected to leave its band
    pub resource: Variable,
    /// How far past the tolerance edge the forecast lands
    pub amount: f64,
    /// Time until the breach (milliseconds)
    pub time_horizon_ms: u64,
    /// Confidence of the breaching prediction
    pub confidence: f64,
    /// Which model produced the need
    pub source: String,
    /// Which side of the band is breached
    pub direction: NeedDirection,
    /// Forecast value at the breach
    pub predicted_value: f64,
    /// Setpoint target at forecast time
    pub target: f64,
}
