//! InternalState - the interoceptive snapshot
//!
//! One snapshot is produced per regulation cycle. Six of the seven regulated
//! variables are normalized to [0, 1]; queue depth is an unbounded count.
//! Consumers receive copies and never mutate a snapshot in place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// A regulated internal variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    Energy,
    ComputationalLoad,
    ThermalState,
    ErrorRate,
    Latency,
    MemoryPressure,
    QueueDepth,
}

impl Variable {
    /// Every tracked variable
    pub const ALL: [Variable; 7] = [
        Variable::Energy,
        Variable::ComputationalLoad,
        Variable::ThermalState,
        Variable::ErrorRate,
        Variable::Latency,
        Variable::MemoryPressure,
        Variable::QueueDepth,
    ];

    /// Variables clamped to [0, 1]
    pub const NORMALIZED: [Variable; 6] = [
        Variable::Energy,
        Variable::ComputationalLoad,
        Variable::ThermalState,
        Variable::ErrorRate,
        Variable::Latency,
        Variable::MemoryPressure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Energy => "energy",
            Variable::ComputationalLoad => "computational_load",
            Variable::ThermalState => "thermal_state",
            Variable::ErrorRate => "error_rate",
            Variable::Latency => "latency",
            Variable::MemoryPressure => "memory_pressure",
            Variable::QueueDepth => "queue_depth",
        }
    }

    /// Whether the variable lives in [0, 1]
    pub fn is_normalized(&self) -> bool {
        !matches!(self, Variable::QueueDepth)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variable {
    type Err = StateError;

    /// Accepts both `snake_case` and `camelCase` names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "energy" => Ok(Variable::Energy),
            "computational_load" | "computationalLoad" => Ok(Variable::ComputationalLoad),
            "thermal_state" | "thermalState" => Ok(Variable::ThermalState),
            "error_rate" | "errorRate" => Ok(Variable::ErrorRate),
            "latency" => Ok(Variable::Latency),
            "memory_pressure" | "memoryPressure" => Ok(Variable::MemoryPressure),
            "queue_depth" | "queueDepth" => Ok(Variable::QueueDepth),
            other => Err(StateError::UnknownVariable(other.to_string())),
        }
    }
}

/// Clamp into [0, 1]
#[inline]
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Snapshot of the process's internal operating variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalState {
    /// Remaining energy / budget (1.0 = full)
    pub energy: f64,
    /// Computational load (1.0 = saturated)
    pub computational_load: f64,
    /// Thermal state (1.0 = at thermal limit)
    pub thermal_state: f64,
    /// Error rate over the recent window
    pub error_rate: f64,
    /// Normalized latency
    pub latency: f64,
    /// Memory pressure (1.0 = exhausted)
    pub memory_pressure: f64,
    /// Pending work items
    pub queue_depth: u64,
    /// Snapshot timestamp (Unix milliseconds)
    pub timestamp: i64,
}

impl Default for InternalState {
    fn default() -> Self {
        Self {
            energy: 1.0,
            computational_load: 0.3,
            thermal_state: 0.3,
            error_rate: 0.0,
            latency: 0.2,
            memory_pressure: 0.3,
            queue_depth: 0,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl InternalState {
    /// Read a variable. Queue depth is widened to `f64`.
    pub fn get(&self, variable: Variable) -> f64 {
        match variable {
            Variable::Energy => self.energy,
            Variable::ComputationalLoad => self.computational_load,
            Variable::ThermalState => self.thermal_state,
            Variable::ErrorRate => self.error_rate,
            Variable::Latency => self.latency,
            Variable::MemoryPressure => self.memory_pressure,
            Variable::QueueDepth => self.queue_depth as f64,
        }
    }

    /// Read a variable by its string key
    pub fn get_by_name(&self, name: &str) -> Result<f64, StateError> {
        let variable: Variable = name.parse()?;
        Ok(self.get(variable))
    }

    /// Write a variable, clamping normalized fields to [0, 1] and rounding
    /// queue depth to a non-negative count
    pub fn set(&mut self, variable: Variable, value: f64) -> Result<(), StateError> {
        if !value.is_finite() {
            return Err(StateError::NonFinite { variable, value });
        }
        match variable {
            Variable::Energy => self.energy = clamp01(value),
            Variable::ComputationalLoad => self.computational_load = clamp01(value),
            Variable::ThermalState => self.thermal_state = clamp01(value),
            Variable::ErrorRate => self.error_rate = clamp01(value),
            Variable::Latency => self.latency = clamp01(value),
            Variable::MemoryPressure => self.memory_pressure = clamp01(value),
            Variable::QueueDepth => self.queue_depth = value.max(0.0).round() as u64,
        }
        Ok(())
    }

    /// Builder-style setter. Non-finite values leave the field unchanged.
    pub fn with(mut self, variable: Variable, value: f64) -> Self {
        let _ = self.set(variable, value);
        self
    }

    /// Set the timestamp
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}
