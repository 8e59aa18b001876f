//! Regulator configuration

use allostat_common::{
    AllostatError, Result, Setpoint, DEFAULT_BUFFER_SIZE, DEFAULT_HISTORY_SIZE,
    DEFAULT_PREDICTION_HORIZON_MS,
};
use serde::{Deserialize, Serialize};

/// Construction-time settings for a [`Regulator`](crate::Regulator)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatorConfig {
    /// Forecast horizon in milliseconds
    pub prediction_horizon_ms: u64,
    /// Snapshot history length
    pub history_size: usize,
    /// Buffered predictions kept for reconciliation
    pub prediction_buffer_size: usize,
    /// Regulation results kept for queries
    pub result_history_size: usize,
    /// Delay between dispatch and re-measurement
    pub settle_delay_ms: u64,
    /// Nominal interval between `sense()` calls, used by the load estimator
    pub expected_sample_interval_ms: u64,
    /// Sensor registry capacity
    pub sensor_capacity: usize,
    /// Registry size after an overflow trim
    pub sensor_low_watermark: usize,
    /// Preference table capacity
    pub preference_capacity: usize,
    /// Minimum need confidence for anticipatory candidates
    pub anticipation_confidence_threshold: f64,
    /// Regulated target bands
    pub setpoints: Vec<Setpoint>,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            prediction_horizon_ms: DEFAULT_PREDICTION_HORIZON_MS,
            history_size: DEFAULT_HISTORY_SIZE,
            prediction_buffer_size: DEFAULT_BUFFER_SIZE,
            result_history_size: DEFAULT_BUFFER_SIZE,
            settle_delay_ms: 100,
            expected_sample_interval_ms: 1000,
            sensor_capacity: 200,
            sensor_low_watermark: 150,
            preference_capacity: 64,
            anticipation_confidence_threshold: 0.5,
            setpoints: Setpoint::reference_defaults(),
        }
    }
}

impl RegulatorConfig {
    /// Set the forecast horizon
    pub fn with_horizon_ms(mut self, horizon_ms: u64) -> Self {
        self.prediction_horizon_ms = horizon_ms;
        self
    }

    /// Set the history length
    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self
    }

    /// Set the settle delay
    pub fn with_settle_delay_ms(mut self, settle_delay_ms: u64) -> Self {
        self.settle_delay_ms = settle_delay_ms;
        self
    }

    /// Replace the setpoint list
    pub fn with_setpoints(mut self, setpoints: Vec<Setpoint>) -> Self {
        self.setpoints = setpoints;
        self
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.prediction_horizon_ms < allostat_common::PREDICTION_STEP_MS {
            return Err(AllostatError::Config(format!(
                "prediction_horizon_ms must be at least {}",
                allostat_common::PREDICTION_STEP_MS
            )));
        }
        if self.history_size == 0
            || self.prediction_buffer_size == 0
            || self.result_history_size == 0
        {
            return Err(AllostatError::Config("buffer sizes must be non-zero".into()));
        }
        if self.sensor_capacity == 0 || self.preference_capacity == 0 {
            return Err(AllostatError::Config("registry capacities must be non-zero".into()));
        }
        if self.sensor_low_watermark > self.sensor_capacity {
            return Err(AllostatError::Config(format!(
                "sensor_low_watermark {} exceeds sensor_capacity {}",
                self.sensor_low_watermark, self.sensor_capacity
            )));
        }
        if self.expected_sample_interval_ms == 0 {
            return Err(AllostatError::Config(
                "expected_sample_interval_ms must be non-zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.anticipation_confidence_threshold) {
            return Err(AllostatError::Config(
                "anticipation_confidence_threshold must be within [0, 1]".into(),
            ));
        }
        for setpoint in &self.setpoints {
            setpoint.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allostat_common::Variable;

    #[test]
    fn test_default_config_is_valid() {
        let config = RegulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.prediction_horizon_ms, 10_000);
        assert_eq!(config.history_size, 100);
        assert_eq!(config.setpoints.len(), 6);
    }

    #[test]
    fn test_rejects_watermark_above_capacity() {
        let mut config = RegulatorConfig::default();
        config.sensor_low_watermark = config.sensor_capacity + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_invalid_setpoint() {
        let mut config = RegulatorConfig::default();
        config.setpoints.push(Setpoint {
            variable: Variable::QueueDepth,
            target: 0.0,
            tolerance: 0.0,
            priority: 1,
            adaptive: false,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserializes_partial_document() {
        let config: RegulatorConfig =
            serde_json::from_str(r#"{ "settle_delay_ms": 5, "history_size": 20 }"#).unwrap();
        assert_eq!(config.settle_delay_ms, 5);
        assert_eq!(config.history_size, 20);
        assert_eq!(config.prediction_horizon_ms, 10_000);
    }
}
