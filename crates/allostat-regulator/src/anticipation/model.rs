//! Linear-trend anticipatory model
//!
//! ## Forecast
//!
//! ```text
//! slope_v      = (last_v - first_v) / n          over the last 10 samples
//! value_v(k)   = clamp01(last_v + slope_v · (k + 1))
//! queue(k)     = queue · (1 - (k + 1) / steps)
//! confidence_k = max(0.3, 1 - 0.05 · k)
//! ```
//!
//! Predictions are kept in a bounded buffer until a measured snapshot lands
//! within 500ms of their timestamp, at which point the per-variable error is
//! logged and the prediction discarded.

use std::collections::BTreeMap;

use allostat_common::{
    clamp01, BoundedBuffer, FutureNeed, InternalState, NeedDirection, Prediction, Setpoint,
    StateValues, Variable, CONFIDENCE_FLOOR, PREDICTION_STEP_MS,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Samples used for trend extrapolation
pub const TREND_WINDOW: usize = 10;

/// Confidence lost per forecast step
pub const CONFIDENCE_DECAY_PER_STEP: f64 = 0.05;

/// Max distance between a prediction and a measurement for reconciliation
pub const RECONCILE_WINDOW_MS: i64 = 500;

/// Tag identifying needs produced by this model
pub const MODEL_SOURCE: &str = "linear_trend";

/// Error of one reconciled prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionError {
    /// Timestamp of the reconciled prediction
    pub predicted_at: i64,
    /// Timestamp of the measurement
    pub measured_at: i64,
    /// Confidence the prediction carried
    pub confidence: f64,
    /// Absolute error per variable
    pub errors: StateValues,
}

/// Aggregate forecast accuracy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelAccuracy {
    /// Number of reconciled predictions
    pub samples: usize,
    /// Mean absolute error per variable
    pub mean_abs_error: StateValues,
}

/// Forecasting component producing predictions and future needs
pub struct AnticipatoryModel {
    predictions: BoundedBuffer<Prediction>,
    errors: BoundedBuffer<PredictionError>,
}

impl AnticipatoryModel {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            predictions: BoundedBuffer::new(buffer_size),
            errors: BoundedBuffer::new(buffer_size),
        }
    }

    /// Forecast without retaining the predictions
    pub fn forecast(
        &self,
        current: &InternalState,
        history: &[InternalState],
        horizon_ms: u64,
    ) -> Vec<Prediction> {
        let steps = (horizon_ms / PREDICTION_STEP_MS).max(1) as usize;
        let window = &history[history.len().saturating_sub(TREND_WINDOW)..];
        let samples = window.len();

        let slopes: BTreeMap<Variable, f64> = Variable::NORMALIZED
            .into_iter()
            .map(|variable| {
                let slope = match window.first() {
                    Some(first) if samples >= 2 => {
                        (current.get(variable) - first.get(variable)) / samples as f64
                    }
                    _ => 0.0,
                };
                (variable, slope)
            })
            .collect();

        let queue = current.queue_depth as f64;
        let based_on = vec![MODEL_SOURCE.to_string(), format!("samples:{samples}")];

        (0..steps)
            .map(|step| {
                let ahead = (step + 1) as f64;
                let mut state: StateValues = slopes
                    .iter()
                    .map(|(&variable, &slope)| {
                        (variable, clamp01(current.get(variable) + slope * ahead))
                    })
                    .collect();
                state.insert(
                    Variable::QueueDepth,
                    (queue * (1.0 - ahead / steps as f64)).max(0.0),
                );

                Prediction {
                    state,
                    timestamp: current.timestamp + (ahead as i64) * PREDICTION_STEP_MS as i64,
                    confidence: step_confidence(step),
                    based_on: based_on.clone(),
                }
            })
            .collect()
    }

    /// Forecast and retain the predictions for later reconciliation
    #[instrument(skip(self, current, history))]
    pub fn predict(
        &mut self,
        current: &InternalState,
        history: &[InternalState],
        horizon_ms: u64,
    ) -> Vec<Prediction> {
        let predictions = self.forecast(current, history, horizon_ms);
        for prediction in &predictions {
            self.predictions.push(prediction.clone());
        }
        debug!(steps = predictions.len(), "Forecast recorded");
        predictions
    }

    /// Forecast, then report the first breach per setpoint
    pub fn predict_needs(
        &mut self,
        current: &InternalState,
        history: &[InternalState],
        setpoints: &[Setpoint],
        horizon_ms: u64,
    ) -> Vec<FutureNeed> {
        let predictions = self.predict(current, history, horizon_ms);
        needs_from(&predictions, setpoints)
    }

    /// Reconcile buffered predictions against a measured snapshot
    ///
    /// Errors are recorded only; the extrapolation itself is not adjusted.
    pub fn update_model(&mut self, actual: &InternalState) -> Vec<PredictionError> {
        let matched = self
            .predictions
            .drain_where(|p| (p.timestamp - actual.timestamp).abs() <= RECONCILE_WINDOW_MS);

        let errors: Vec<PredictionError> = matched
            .into_iter()
            .map(|prediction| PredictionError {
                predicted_at: prediction.timestamp,
                measured_at: actual.timestamp,
                confidence: prediction.confidence,
                errors: prediction
                    .state
                    .iter()
                    .map(|(&variable, &value)| (variable, (value - actual.get(variable)).abs()))
                    .collect(),
            })
            .collect();

        for error in &errors {
            self.errors.push(error.clone());
        }
        if !errors.is_empty() {
            debug!(reconciled = errors.len(), "Predictions reconciled");
        }
        errors
    }

    /// Predictions awaiting reconciliation
    pub fn pending(&self) -> &BoundedBuffer<Prediction> {
        &self.predictions
    }

    /// Mean absolute error over the retained error log
    pub fn accuracy(&self) -> ModelAccuracy {
        let samples = self.errors.len();
        if samples == 0 {
            return ModelAccuracy::default();
        }

        let mut totals: StateValues = BTreeMap::new();
        for error in self.errors.iter() {
            for (&variable, &value) in &error.errors {
                *totals.entry(variable).or_insert(0.0) += value;
            }
        }
        let mean_abs_error = totals
            .into_iter()
            .map(|(variable, total)| (variable, total / samples as f64))
            .collect();

        ModelAccuracy {
            samples,
            mean_abs_error,
        }
    }
}

/// Confidence assigned to forecast step `step` (0-based)
#[inline]
pub fn step_confidence(step: usize) -> f64 {
    (1.0 - CONFIDENCE_DECAY_PER_STEP * step as f64).max(CONFIDENCE_FLOOR)
}

/// First out-of-band prediction per setpoint, in horizon order
pub fn needs_from(predictions: &[Prediction], setpoints: &[Setpoint]) -> Vec<FutureNeed> {
    setpoints
        .iter()
        .filter_map(|setpoint| {
            predictions.iter().enumerate().find_map(|(step, prediction)| {
                let value = prediction.value(setpoint.variable)?;
                let deviation = setpoint.deviation(value);
                (deviation > setpoint.tolerance).then(|| FutureNeed {
                    resource: setpoint.variable,
                    amount: deviation - setpoint.tolerance,
                    time_horizon_ms: (step as u64 + 1) * PREDICTION_STEP_MS,
                    confidence: prediction.confidence,
                    source: MODEL_SOURCE.to_string(),
                    direction: if value < setpoint.target {
                        NeedDirection::Deficit
                    } else {
                        NeedDirection::Surplus
                    },
                    predicted_value: value,
                    target: setpoint.target,
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(variable: Variable, values: &[f64]) -> Vec<InternalState> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| InternalState::default().with(variable, v).at(i as i64 * 1000))
            .collect()
    }

    fn energy_setpoint() -> Setpoint {
        Setpoint::new(Variable::Energy, 0.7, 0.2, 1, true).unwrap()
    }

    #[test]
    fn test_confidence_non_increasing_and_floored() {
        let model = AnticipatoryModel::new(100);
        let history = series(Variable::Energy, &[0.7, 0.7]);
        let current = history.last().unwrap().clone();
        let predictions = model.forecast(&current, &history, 30_000);

        assert_eq!(predictions.len(), 30);
        assert_eq!(predictions[0].confidence, 1.0);
        for pair in predictions.windows(2) {
            assert!(pair[1].confidence <= pair[0].confidence);
        }
        assert!(predictions.iter().all(|p| p.confidence >= CONFIDENCE_FLOOR));
        assert_eq!(predictions.last().unwrap().confidence, CONFIDENCE_FLOOR);
    }

    #[test]
    fn test_trend_extrapolation_is_clamped() {
        let model = AnticipatoryModel::new(100);
        let history = series(Variable::ComputationalLoad, &[0.5, 0.6, 0.7, 0.8]);
        let current = history.last().unwrap().clone();
        let predictions = model.forecast(&current, &history, 10_000);

        // slope = (0.8 - 0.5) / 4 = 0.075 per step
        let first = predictions[0].value(Variable::ComputationalLoad).unwrap();
        assert!((first - 0.875).abs() < 1e-9);
        let last = predictions[9].value(Variable::ComputationalLoad).unwrap();
        assert_eq!(last, 1.0);
        assert_eq!(predictions[0].timestamp, current.timestamp + 1000);
    }

    #[test]
    fn test_queue_relaxes_toward_zero() {
        let model = AnticipatoryModel::new(100);
        let current = InternalState::default().with(Variable::QueueDepth, 100.0).at(0);
        let predictions = model.forecast(&current, &[current.clone()], 10_000);
        assert_eq!(predictions[0].value(Variable::QueueDepth), Some(90.0));
        assert_eq!(predictions[4].value(Variable::QueueDepth), Some(50.0));
        assert_eq!(predictions[9].value(Variable::QueueDepth), Some(0.0));
    }

    #[test]
    fn test_flat_in_tolerance_series_has_no_needs() {
        let mut model = AnticipatoryModel::new(100);
        let history = series(Variable::Energy, &[0.7; 12]);
        let current = history.last().unwrap().clone();
        let needs = model.predict_needs(&current, &history, &[energy_setpoint()], 10_000);
        assert!(needs.is_empty());
    }

    #[test]
    fn test_need_reported_at_first_breach() {
        let mut model = AnticipatoryModel::new(100);
        // energy falls 0.05 per sample; slope = (0.6 - 0.8) / 5 = -0.04 per step
        let history = series(Variable::Energy, &[0.8, 0.75, 0.7, 0.65, 0.6]);
        let current = history.last().unwrap().clone();
        let needs = model.predict_needs(&current, &history, &[energy_setpoint()], 10_000);

        assert_eq!(needs.len(), 1);
        let need = &needs[0];
        assert_eq!(need.resource, Variable::Energy);
        assert_eq!(need.direction, NeedDirection::Deficit);
        // 0.6 - 0.04·k < 0.5  first holds at k = 3 (step index 2)
        assert_eq!(need.time_horizon_ms, 3000);
        assert_eq!(need.confidence, step_confidence(2));
        assert!(need.amount > 0.0);
        assert_eq!(need.source, MODEL_SOURCE);
    }

    #[test]
    fn test_need_not_reported_when_breach_is_beyond_horizon() {
        let mut model = AnticipatoryModel::new(100);
        let history = series(Variable::Energy, &[0.8, 0.75, 0.7, 0.65, 0.6]);
        let current = history.last().unwrap().clone();
        let needs = model.predict_needs(&current, &history, &[energy_setpoint()], 2_000);
        assert!(needs.is_empty());
    }

    #[test]
    fn test_one_need_per_setpoint() {
        let predictions: Vec<Prediction> = (0..5)
            .map(|step| Prediction {
                state: [(Variable::Energy, 0.1)].into_iter().collect(),
                timestamp: step * 1000,
                confidence: step_confidence(step as usize),
                based_on: vec![],
            })
            .collect();
        let needs = needs_from(&predictions, &[energy_setpoint()]);
        assert_eq!(needs.len(), 1);
        assert_eq!(needs[0].time_horizon_ms, 1000);
    }

    #[test]
    fn test_prediction_buffer_is_bounded() {
        let mut model = AnticipatoryModel::new(25);
        let current = InternalState::default().at(0);
        for _ in 0..5 {
            model.predict(&current, &[current.clone()], 10_000);
            assert!(model.pending().len() <= 25);
        }
        assert_eq!(model.pending().len(), 25);
    }

    #[test]
    fn test_update_model_reconciles_nearby_predictions() {
        let mut model = AnticipatoryModel::new(100);
        let current = InternalState::default().with(Variable::Latency, 0.2).at(0);
        model.predict(&current, &[current.clone()], 10_000);

        let actual = InternalState::default().with(Variable::Latency, 0.5).at(2_300);
        let errors = model.update_model(&actual);

        // only the 2000ms prediction lies within 500ms
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].predicted_at, 2000);
        let latency_error = errors[0].errors[&Variable::Latency];
        assert!((latency_error - 0.3).abs() < 1e-9);
        assert_eq!(model.pending().len(), 9);

        let accuracy = model.accuracy();
        assert_eq!(accuracy.samples, 1);
        assert!((accuracy.mean_abs_error[&Variable::Latency] - 0.3).abs() < 1e-9);
    }
}
