//! Sensor registry
//!
//! Maps each variable to a pluggable value supplier. Every read runs inside
//! its own fault boundary: an `Err`, a non-finite reading, or a panic is
//! reported as a [`SensorFault`] and never reaches the caller as a failure of
//! the whole pass.

use std::panic::{self, AssertUnwindSafe};

use allostat_common::{BoundedMap, StateError, Variable};
use thiserror::Error;
use tracing::debug;

/// Value supplier invoked once per sensing pass
pub type SensorFn = Box<dyn Fn() -> anyhow::Result<f64> + Send + Sync>;

/// Why a sensor read was discarded
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorFault {
    #[error("sensor returned error: {0}")]
    Failed(String),

    #[error("sensor returned non-finite value {0}")]
    NonFinite(f64),

    #[error("sensor panicked")]
    Panicked,
}

/// Capacity-bounded registry of value suppliers
pub struct SensorRegistry {
    sensors: BoundedMap<Variable, SensorFn>,
}

impl SensorRegistry {
    pub fn new(capacity: usize, low_watermark: usize) -> Self {
        Self {
            sensors: BoundedMap::new(capacity, low_watermark),
        }
    }

    /// Install or replace the supplier for a variable named by string key
    pub fn register<F>(&mut self, name: &str, supplier: F) -> Result<Variable, StateError>
    where
        F: Fn() -> anyhow::Result<f64> + Send + Sync + 'static,
    {
        let variable: Variable = name.parse()?;
        self.register_variable(variable, supplier);
        Ok(variable)
    }

    /// Install or replace the supplier for a variable
    pub fn register_variable<F>(&mut self, variable: Variable, supplier: F)
    where
        F: Fn() -> anyhow::Result<f64> + Send + Sync + 'static,
    {
        let evicted = self.sensors.insert(variable, Box::new(supplier));
        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), "Sensor registry trimmed");
        }
    }

    pub fn unregister(&mut self, variable: Variable) -> bool {
        self.sensors.remove(&variable).is_some()
    }

    pub fn contains(&self, variable: Variable) -> bool {
        self.sensors.contains_key(&variable)
    }

    /// Registered variables, oldest registration first
    pub fn variables(&self) -> Vec<Variable> {
        self.sensors.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Invoke the supplier for `variable`; `None` when nothing is registered
    pub fn read(&self, variable: Variable) -> Option<Result<f64, SensorFault>> {
        let sensor = self.sensors.get(&variable)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sensor()));
        Some(match outcome {
            Ok(Ok(value)) if value.is_finite() => Ok(value),
            Ok(Ok(value)) => Err(SensorFault::NonFinite(value)),
            Ok(Err(err)) => Err(SensorFault::Failed(err.to_string())),
            Err(_) => Err(SensorFault::Panicked),
        })
    }
}
