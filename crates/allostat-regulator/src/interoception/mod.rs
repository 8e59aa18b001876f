//! Interoception engine
//!
//! Produces one [`InternalState`] snapshot per pass:
//! - registered sensors are read under per-sensor fault isolation
//! - unregistered variables fall back to built-in estimators
//! - every snapshot is appended to a bounded history
//!
//! The history feeds rate-of-change and anomaly queries.

pub mod estimators;
pub mod sensors;

use allostat_common::{BoundedBuffer, InternalState, Variable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use self::sensors::{SensorFault, SensorFn, SensorRegistry};

/// Samples used for rate-of-change estimation
pub const DERIVATIVE_WINDOW: usize = 5;

/// Samples used for anomaly statistics
pub const ANOMALY_WINDOW: usize = 20;

/// Minimum samples before anomaly detection runs
pub const ANOMALY_MIN_SAMPLES: usize = 10;

/// |z| above which a value is anomalous
pub const ANOMALY_Z_THRESHOLD: f64 = 2.0;

/// A value that deviates from its recent distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub variable: Variable,
    pub value: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub z_score: f64,
}

/// Sensing subsystem owning the current snapshot and its history
pub struct InteroceptionEngine {
    current: InternalState,
    history: BoundedBuffer<InternalState>,
    sensors: SensorRegistry,
    expected_interval_ms: u64,
    last_scheduled_at: Option<i64>,
    last_faults: Vec<(Variable, SensorFault)>,
}

impl InteroceptionEngine {
    pub fn new(
        history_size: usize,
        sensor_capacity: usize,
        sensor_low_watermark: usize,
        expected_interval_ms: u64,
    ) -> Self {
        Self {
            current: InternalState::default(),
            history: BoundedBuffer::new(history_size),
            sensors: SensorRegistry::new(sensor_capacity, sensor_low_watermark),
            expected_interval_ms,
            last_scheduled_at: None,
            last_faults: Vec::new(),
        }
    }

    /// Replace the baseline the next pass starts from
    pub fn with_initial_state(mut self, state: InternalState) -> Self {
        self.current = state;
        self
    }

    pub fn sensors(&self) -> &SensorRegistry {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut SensorRegistry {
        &mut self.sensors
    }

    /// Latest snapshot
    pub fn current(&self) -> &InternalState {
        &self.current
    }

    pub fn history(&self) -> &BoundedBuffer<InternalState> {
        &self.history
    }

    /// Sensor faults observed during the most recent pass
    pub fn last_faults(&self) -> &[(Variable, SensorFault)] {
        &self.last_faults
    }

    /// Take a snapshot stamped with the wall clock
    pub fn sense(&mut self) -> InternalState {
        self.sense_at(chrono::Utc::now().timestamp_millis())
    }

    /// Take a scheduled snapshot stamped with `timestamp` (Unix milliseconds)
    ///
    /// Scheduled snapshots are the ones taken on the host's sensing cadence;
    /// only they feed the jitter-based load estimate.
    pub fn sense_at(&mut self, timestamp: i64) -> InternalState {
        self.pass(timestamp, true)
    }

    /// Re-measure off-cadence, e.g. after an action has settled
    ///
    /// Sensors are read as usual but the load estimate carries over unchanged,
    /// since the interval since the last scheduled snapshot says nothing about
    /// host load.
    pub fn resense_at(&mut self, timestamp: i64) -> InternalState {
        self.pass(timestamp, false)
    }

    fn pass(&mut self, timestamp: i64, scheduled: bool) -> InternalState {
        let mut next = self.current.clone();
        next.timestamp = timestamp;
        self.last_faults.clear();

        for variable in Variable::ALL {
            match self.sensors.read(variable) {
                Some(Ok(value)) => {
                    // Finite by construction, so set cannot fail
                    let _ = next.set(variable, value);
                }
                Some(Err(fault)) => {
                    warn!(
                        variable = %variable,
                        error = %fault,
                        "Sensor read failed, keeping prior value"
                    );
                    self.last_faults.push((variable, fault));
                }
                None => self.estimate(variable, &mut next, scheduled),
            }
        }

        if scheduled {
            self.last_scheduled_at = Some(timestamp);
        }
        self.record(next.clone());
        next
    }

    /// Append an externally produced snapshot
    pub fn record(&mut self, snapshot: InternalState) {
        self.current = snapshot.clone();
        self.history.push(snapshot);
    }

    fn estimate(&self, variable: Variable, next: &mut InternalState, scheduled: bool) {
        match variable {
            Variable::ComputationalLoad if scheduled => {
                if let Some(previous_at) = self.last_scheduled_at {
                    next.computational_load = estimators::load_from_jitter(
                        next.computational_load,
                        self.expected_interval_ms,
                        next.timestamp - previous_at,
                    );
                }
            }
            Variable::MemoryPressure => match estimators::memory_pressure() {
                Ok(pressure) => next.memory_pressure = pressure,
                Err(e) => debug!(error = %e, "Memory pressure estimator unavailable"),
            },
            _ => {}
        }
    }

    /// Least-squares slope of `variable` over the last samples, per second
    pub fn get_derivative(&self, variable: Variable) -> f64 {
        let window: Vec<&InternalState> = self.history.recent(DERIVATIVE_WINDOW).collect();
        if window.len() < 2 {
            return 0.0;
        }

        let origin = window[0].timestamp;
        let points: Vec<(f64, f64)> = window
            .iter()
            .map(|s| ((s.timestamp - origin) as f64 / 1000.0, s.get(variable)))
            .collect();

        let n = points.len() as f64;
        let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), (x, y)| {
            let dx = x - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });

        if den <= f64::EPSILON {
            0.0
        } else {
            num / den
        }
    }

    /// Variables whose latest value sits more than two standard deviations
    /// from the mean of the recent window
    pub fn detect_anomalies(&self) -> Vec<Anomaly> {
        let window: Vec<&InternalState> = self.history.recent(ANOMALY_WINDOW).collect();
        if window.len() < ANOMALY_MIN_SAMPLES {
            return Vec::new();
        }
        let Some(latest) = window.last() else {
            return Vec::new();
        };

        let n = window.len() as f64;
        Variable::ALL
            .into_iter()
            .filter_map(|variable| {
                let mean = window.iter().map(|s| s.get(variable)).sum::<f64>() / n;
                let variance = window
                    .iter()
                    .map(|s| (s.get(variable) - mean).powi(2))
                    .sum::<f64>()
                    / n;
                let std_dev = variance.sqrt();
                if std_dev <= f64::EPSILON {
                    return None;
                }

                let value = latest.get(variable);
                let z_score = (value - mean) / std_dev;
                (z_score.abs() > ANOMALY_Z_THRESHOLD).then_some(Anomaly {
                    variable,
                    value,
                    mean,
                    std_dev,
                    z_score,
                })
            })
            .collect()
    }
}
