//! Regulation orchestrator
//!
//! Sequences one full cycle:
//!
//! ```text
//! sense → forecast → future needs → candidates → EFE selection
//!       → actuator dispatch → settle delay → re-sense → model feedback
//! ```
//!
//! At most one cycle runs at a time. A `regulate()` call that arrives while a
//! cycle is in flight returns `None` immediately and is not queued. Scheduling
//! is owned by the host; the regulator never triggers itself.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use allostat_common::{
    clamp01, Action, ActionType, AllostatError, BoundedBuffer, InternalState, Prediction,
    RegulationResult, Result, SetpointError, Setpoint, StateValues, Variable,
};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, instrument, warn};

use crate::actuator::{Actuator, ActuatorCommand};
use crate::anticipation::{needs_from, AnticipatoryModel, ModelAccuracy};
use crate::clock::{Clock, SystemClock};
use crate::config::RegulatorConfig;
use crate::controller::{
    sensitivity, ActiveInferenceController, CandidateGenerator, CandidateRules, Preference,
};
use crate::interoception::{Anomaly, InteroceptionEngine};
use crate::metrics::{RegulationLedger, RegulationMetrics};
use crate::telemetry::RegulatorTelemetry;

/// Near-term predictions checked by `needs_regulation`
const NEAR_TERM_STEPS: usize = 3;

/// Near-term window for anticipatory checks (ms)
const NEAR_TERM_WINDOW_MS: i64 = 5_000;

/// Tolerance multiplier for anticipatory checks
const ANTICIPATORY_MARGIN: f64 = 1.5;

/// Slack allowed when judging whether the target held
const SUCCESS_EPSILON: f64 = 1e-9;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications published by the regulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegulatorEvent {
    /// An adaptive setpoint target moved
    SetpointAdapted {
        variable: Variable,
        previous_target: f64,
        new_target: f64,
    },
    /// A cycle dispatched an action and recorded its result
    CycleCompleted {
        action_type: ActionType,
        success: bool,
    },
    /// A `regulate()` call was dropped because a cycle was in flight
    CycleRejected,
}

/// Decision taken in the first half of a cycle
struct CyclePlan {
    action: Action,
    before: InternalState,
    predicted_effect: StateValues,
}

/// Components touched only from within a cycle or a query
struct RegulatorCore {
    interoception: InteroceptionEngine,
    model: AnticipatoryModel,
    controller: ActiveInferenceController,
    candidates: CandidateGenerator,
    setpoints: Vec<Setpoint>,
    results: BoundedBuffer<RegulationResult>,
    ledger: RegulationLedger,
    clock: Arc<dyn Clock>,
}

impl RegulatorCore {
    fn new(config: &RegulatorConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut controller = ActiveInferenceController::new(config.preference_capacity);
        for setpoint in &config.setpoints {
            controller.set_preference(
                setpoint.variable,
                setpoint.target,
                setpoint.priority as f64,
            )?;
        }

        let rules = CandidateRules {
            confidence_threshold: config.anticipation_confidence_threshold,
            urgency_horizon_ms: config.prediction_horizon_ms,
            ..CandidateRules::default()
        };

        Ok(Self {
            interoception: InteroceptionEngine::new(
                config.history_size,
                config.sensor_capacity,
                config.sensor_low_watermark,
                config.expected_sample_interval_ms,
            ),
            model: AnticipatoryModel::new(config.prediction_buffer_size),
            controller,
            candidates: CandidateGenerator::new(rules),
            setpoints: config.setpoints.clone(),
            results: BoundedBuffer::new(config.result_history_size),
            ledger: RegulationLedger::default(),
            clock,
        })
    }

    /// Snapshot on the host's cadence; `scheduled = false` for the settle
    /// re-measurement
    fn sense(&mut self, scheduled: bool, telemetry: &RegulatorTelemetry) -> InternalState {
        let now = self.clock.now_ms();
        let state = if scheduled {
            self.interoception.sense_at(now)
        } else {
            self.interoception.resense_at(now)
        };
        let faults = self.interoception.last_faults().len() as u64;
        if faults > 0 {
            telemetry.sensor_failures_total.inc_by(faults);
        }
        telemetry.observe_state(&state);
        state
    }

    fn plan(&mut self, horizon_ms: u64, telemetry: &RegulatorTelemetry) -> Option<CyclePlan> {
        let state = self.sense(true, telemetry);
        let history = self.interoception.history().to_vec();
        let predictions = self.model.predict(&state, &history, horizon_ms);
        let needs = needs_from(&predictions, &self.setpoints);
        let candidates = self.candidates.generate(&state, &needs);

        let action = self
            .controller
            .select_action(&candidates, &state, &predictions)?;
        let predicted_effect =
            sensitivity::predicted_effect(action.action_type, action.magnitude, &state);

        Some(CyclePlan {
            action,
            before: state,
            predicted_effect,
        })
    }

    fn complete(
        &mut self,
        plan: CyclePlan,
        dispatched: bool,
        telemetry: &RegulatorTelemetry,
    ) -> RegulationResult {
        let after = self.sense(false, telemetry);

        let actual_effect: StateValues = Variable::ALL
            .into_iter()
            .map(|v| (v, after.get(v) - plan.before.get(v)))
            .collect();
        let success = dispatched && self.target_held(plan.action.target, &plan.before, &after);

        let result = RegulationResult {
            action: plan.action,
            predicted_effect: plan.predicted_effect,
            actual_effect,
            dispatched,
            success,
            completed_at: after.timestamp,
        };

        self.results.push(result.clone());
        self.ledger.record(&result);
        self.model.update_model(&after);
        result
    }

    /// The target did not drift further from its setpoint
    fn target_held(&self, target: Variable, before: &InternalState, after: &InternalState) -> bool {
        self.setpoints
            .iter()
            .find(|sp| sp.variable == target)
            .map_or(true, |sp| {
                let drift = sp.deviation(after.get(target)) - sp.deviation(before.get(target));
                drift <= SUCCESS_EPSILON
            })
    }

    fn forecast(&self, horizon_ms: u64) -> Vec<Prediction> {
        let history = self.interoception.history().to_vec();
        self.model
            .forecast(self.interoception.current(), &history, horizon_ms)
    }
}

/// Resets the in-flight flag when a cycle ends or its future is dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Predictive resource-regulation controller
pub struct Regulator {
    config: RegulatorConfig,
    core: Mutex<RegulatorCore>,
    actuator: Arc<dyn Actuator>,
    in_flight: AtomicBool,
    shut_down: AtomicBool,
    shutdown_signal: Notify,
    events: broadcast::Sender<RegulatorEvent>,
    telemetry: RegulatorTelemetry,
}

impl Regulator {
    /// Build a regulator around an injected actuator, stamping snapshots
    /// with the wall clock
    pub fn new(config: RegulatorConfig, actuator: Arc<dyn Actuator>) -> Result<Self> {
        Self::with_clock(config, actuator, Arc::new(SystemClock))
    }

    /// Build a regulator with an explicit timestamp source
    pub fn with_clock(
        config: RegulatorConfig,
        actuator: Arc<dyn Actuator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let telemetry = RegulatorTelemetry::new()
            .map_err(|e| AllostatError::Internal(format!("Failed to create telemetry: {}", e)))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            horizon_ms = config.prediction_horizon_ms,
            history_size = config.history_size,
            setpoints = config.setpoints.len(),
            "Regulator initialized"
        );

        Ok(Self {
            core: Mutex::new(RegulatorCore::new(&config, clock)?),
            config,
            actuator,
            in_flight: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            shutdown_signal: Notify::new(),
            events,
            telemetry,
        })
    }

    pub fn config(&self) -> &RegulatorConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &RegulatorTelemetry {
        &self.telemetry
    }

    /// Subscribe to regulator notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RegulatorEvent> {
        self.events.subscribe()
    }

    /// Install or replace the value supplier for a variable named by key
    pub fn register_sensor<F>(&self, name: &str, supplier: F) -> Result<Variable>
    where
        F: Fn() -> anyhow::Result<f64> + Send + Sync + 'static,
    {
        let variable = self
            .core
            .lock()
            .interoception
            .sensors_mut()
            .register(name, supplier)?;
        debug!(variable = %variable, "Sensor registered");
        Ok(variable)
    }

    /// Remove a variable's supplier, falling back to built-in estimation
    pub fn unregister_sensor(&self, variable: Variable) -> bool {
        self.core.lock().interoception.sensors_mut().unregister(variable)
    }

    pub fn registered_sensors(&self) -> Vec<Variable> {
        self.core.lock().interoception.sensors().variables()
    }

    /// Whether a cycle is currently in flight
    pub fn is_regulating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one regulation cycle
    ///
    /// Returns `None` when a cycle is already in flight, when no candidate
    /// action applies, or when the regulator is shut down mid-cycle.
    #[instrument(skip(self))]
    pub async fn regulate(&self) -> Option<RegulationResult> {
        if self.shut_down.load(Ordering::Acquire) {
            debug!("Regulator shut down, ignoring regulate call");
            return None;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Regulation cycle already in flight, dropping call");
            self.telemetry.cycles_rejected_total.inc();
            let _ = self.events.send(RegulatorEvent::CycleRejected);
            return None;
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.run_cycle().await
    }

    async fn run_cycle(&self) -> Option<RegulationResult> {
        let plan = {
            let mut core = self.core.lock();
            core.plan(self.config.prediction_horizon_ms, &self.telemetry)
        };
        let Some(plan) = plan else {
            debug!("No viable candidate, cycle ends without action");
            return None;
        };

        let dispatched = self.dispatch(&plan.action).await;

        if !self.settle().await {
            info!(
                action = %plan.action.action_type,
                "Regulator shut down mid-cycle, discarding cycle"
            );
            return None;
        }

        let result = {
            let mut core = self.core.lock();
            core.complete(plan, dispatched, &self.telemetry)
        };

        self.telemetry.cycles_total.inc();
        let _ = self.events.send(RegulatorEvent::CycleCompleted {
            action_type: result.action.action_type,
            success: result.success,
        });
        info!(
            action = %result.action.action_type,
            target = %result.action.target,
            magnitude = result.action.magnitude,
            lead_time_ms = result.action.lead_time_ms,
            success = result.success,
            "Regulation cycle completed"
        );
        Some(result)
    }

    /// Hand the action to the actuator; failures and panics are contained
    async fn dispatch(&self, action: &Action) -> bool {
        let command = ActuatorCommand::from(action);
        let outcome = AssertUnwindSafe(self.actuator.dispatch(command))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                self.telemetry.observe_action(action.action_type);
                true
            }
            Ok(Err(e)) => {
                warn!(action = %action.action_type, error = %e, "Actuator dispatch failed");
                self.telemetry.actuator_failures_total.inc();
                false
            }
            Err(_) => {
                warn!(action = %action.action_type, "Actuator panicked during dispatch");
                self.telemetry.actuator_failures_total.inc();
                false
            }
        }
    }

    /// Wait out the settle delay; `false` if shut down while waiting
    async fn settle(&self) -> bool {
        let notified = self.shutdown_signal.notified();
        if self.shut_down.load(Ordering::Acquire) {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)) => true,
            _ = notified => false,
        }
    }

    /// Cancel any in-flight settle delay and refuse further cycles
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.shutdown_signal.notify_waiters();
        info!("Regulator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Take a scheduled snapshot outside a regulation cycle
    pub fn sense(&self) -> InternalState {
        self.core.lock().sense(true, &self.telemetry)
    }

    /// Latest snapshot
    pub fn get_state(&self) -> InternalState {
        self.core.lock().interoception.current().clone()
    }

    /// Forecast from the latest snapshot without retaining the predictions
    pub fn get_predictions(&self, horizon_ms: Option<u64>) -> Vec<Prediction> {
        let horizon_ms = horizon_ms.unwrap_or(self.config.prediction_horizon_ms);
        self.core.lock().forecast(horizon_ms)
    }

    /// Whether the current state, or the near-term forecast with an
    /// anticipatory margin, leaves any setpoint band
    pub fn needs_regulation(&self) -> bool {
        let core = self.core.lock();
        let state = core.interoception.current();

        if core
            .setpoints
            .iter()
            .any(|sp| sp.is_violated(state.get(sp.variable)))
        {
            return true;
        }

        core.forecast(self.config.prediction_horizon_ms)
            .iter()
            .take(NEAR_TERM_STEPS)
            .filter(|p| p.timestamp - state.timestamp <= NEAR_TERM_WINDOW_MS)
            .any(|p| {
                core.setpoints.iter().any(|sp| {
                    p.value(sp.variable)
                        .is_some_and(|v| sp.deviation(v) > sp.tolerance * ANTICIPATORY_MARGIN)
                })
            })
    }

    /// Move an adaptive setpoint and its preference together
    ///
    /// Returns `Ok(false)` without changing anything when the setpoint is not
    /// adaptive.
    pub fn adapt_setpoint(&self, variable: Variable, new_target: f64) -> Result<bool> {
        if !new_target.is_finite() {
            return Err(SetpointError::InvalidTarget {
                variable,
                target: new_target,
            }
            .into());
        }
        let new_target = if variable.is_normalized() {
            clamp01(new_target)
        } else {
            new_target.max(0.0)
        };

        let previous_target = {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            let setpoint = core
                .setpoints
                .iter_mut()
                .find(|sp| sp.variable == variable)
                .ok_or(SetpointError::NotFound(variable))?;

            if !setpoint.adaptive {
                debug!(variable = %variable, "Setpoint is fixed, adaptation ignored");
                return Ok(false);
            }

            let precision = core
                .controller
                .preference(variable)
                .map_or(setpoint.priority as f64, |p| p.precision);
            core.controller
                .set_preference(variable, new_target, precision)?;
            let previous = setpoint.target;
            setpoint.target = new_target;
            previous
        };

        info!(variable = %variable, previous_target, new_target, "Setpoint adapted");
        let _ = self.events.send(RegulatorEvent::SetpointAdapted {
            variable,
            previous_target,
            new_target,
        });
        Ok(true)
    }

    pub fn setpoints(&self) -> Vec<Setpoint> {
        self.core.lock().setpoints.clone()
    }

    pub fn preferences(&self) -> Vec<(Variable, Preference)> {
        self.core.lock().controller.preferences()
    }

    /// Record a preference that does not correspond to a setpoint
    pub fn set_preference(&self, variable: Variable, target: f64, precision: f64) -> Result<()> {
        self.core
            .lock()
            .controller
            .set_preference(variable, target, precision)?;
        Ok(())
    }

    /// Retained regulation results, oldest first
    pub fn results(&self) -> Vec<RegulationResult> {
        self.core.lock().results.to_vec()
    }

    pub fn get_metrics(&self) -> RegulationMetrics {
        let core = self.core.lock();
        core.ledger
            .snapshot(core.interoception.current(), &core.setpoints)
    }

    pub fn model_accuracy(&self) -> ModelAccuracy {
        self.core.lock().model.accuracy()
    }

    pub fn detect_anomalies(&self) -> Vec<Anomaly> {
        self.core.lock().interoception.detect_anomalies()
    }

    /// Per-second rate of change of a variable
    pub fn get_derivative(&self, variable: Variable) -> f64 {
        self.core.lock().interoception.get_derivative(variable)
    }
}
