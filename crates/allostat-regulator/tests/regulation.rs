//! End-to-end regulation scenarios

use std::sync::Arc;

use allostat_common::{ActionType, Variable};
use allostat_regulator::{
    ChannelActuator, LoggingActuator, Regulator, RegulatorConfig, RegulatorEvent,
};

const NOMINAL: [(&str, f64); 7] = [
    ("energy", 0.7),
    ("computational_load", 0.5),
    ("thermal_state", 0.3),
    ("error_rate", 0.0),
    ("latency", 0.2),
    ("memory_pressure", 0.5),
    ("queue_depth", 0.0),
];

fn config() -> RegulatorConfig {
    RegulatorConfig::default().with_settle_delay_ms(50)
}

fn regulator(config: RegulatorConfig) -> Regulator {
    let regulator = Regulator::new(config, Arc::new(LoggingActuator)).unwrap();
    install(&regulator, &[]);
    regulator
}

/// Nominal sensors with selected overrides
fn install(regulator: &Regulator, overrides: &[(&str, f64)]) {
    for (name, nominal) in NOMINAL {
        let value = overrides
            .iter()
            .find(|(key, _)| *key == name)
            .map_or(nominal, |(_, v)| *v);
        regulator.register_sensor(name, move || Ok(value)).unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_high_load_is_throttled() {
    let regulator = regulator(config());
    install(&regulator, &[("energy", 0.9), ("computational_load", 0.95)]);

    let result = regulator.regulate().await.unwrap();

    assert_eq!(result.action.action_type, ActionType::Throttle);
    assert_eq!(result.action.target, Variable::ComputationalLoad);
    assert!(result.dispatched);
    assert!(result.success);
    assert!(result.predicted_effect[&Variable::ComputationalLoad] < 0.0);
    assert_eq!(result.actual_effect.len(), Variable::ALL.len());
}

#[tokio::test(start_paused = true)]
async fn test_energy_depletion_hibernates() {
    let regulator = regulator(config());
    install(&regulator, &[("energy", 0.2)]);

    let result = regulator.regulate().await.unwrap();

    assert_eq!(result.action.action_type, ActionType::Hibernate);
    assert!((result.action.magnitude - 0.8).abs() < 1e-9);
    assert!(!result.action.is_anticipatory());
}

#[tokio::test(start_paused = true)]
async fn test_falling_energy_is_deferred_ahead_of_breach() {
    let regulator = regulator(config());
    for energy in [0.88, 0.8, 0.72, 0.64] {
        install(&regulator, &[("energy", energy)]);
        regulator.sense();
    }
    install(&regulator, &[("energy", 0.56)]);

    let result = regulator.regulate().await.unwrap();

    assert_eq!(result.action.action_type, ActionType::Defer);
    assert_eq!(result.action.lead_time_ms, 1000);
    assert!(result.action.is_anticipatory());

    let metrics = regulator.get_metrics();
    assert_eq!(metrics.regulation_count, 1);
    assert!((metrics.average_anticipation_ms - 1000.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_nominal_system_is_left_alone() {
    let regulator = regulator(config());
    assert!(!regulator.needs_regulation());
    assert!(regulator.regulate().await.is_none());
    assert!(regulator.results().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_calls_run_one_cycle() {
    let regulator = regulator(config());
    install(&regulator, &[("computational_load", 0.95)]);
    let mut events = regulator.subscribe();

    let (first, second) = tokio::join!(regulator.regulate(), regulator.regulate());

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(regulator.results().len(), 1);
    assert_eq!(regulator.get_metrics().regulation_count, 1);
    assert_eq!(regulator.telemetry().cycles_rejected_total.get(), 1);

    assert_eq!(events.recv().await.unwrap(), RegulatorEvent::CycleRejected);
    assert!(matches!(
        events.recv().await.unwrap(),
        RegulatorEvent::CycleCompleted {
            action_type: ActionType::Throttle,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_metrics_accumulate_across_cycles() {
    let mut config = config();
    config.result_history_size = 2;
    let regulator = regulator(config);
    install(&regulator, &[("computational_load", 0.95)]);

    for _ in 0..3 {
        assert!(regulator.regulate().await.is_some());
    }

    let metrics = regulator.get_metrics();
    assert_eq!(metrics.regulation_count, 3);
    assert_eq!(metrics.action_type_histogram[&ActionType::Throttle], 3);
    assert!((metrics.success_rate - 1.0).abs() < 1e-9);
    assert!((metrics.per_variable_deviation[&Variable::ComputationalLoad] - 0.45).abs() < 1e-9);
    assert_eq!(regulator.results().len(), 2);
    assert_eq!(regulator.telemetry().cycles_total.get(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_channel_actuator_receives_selected_action() {
    let (actuator, mut commands) = ChannelActuator::new(8);
    let regulator = Regulator::new(config(), Arc::new(actuator)).unwrap();
    install(&regulator, &[("error_rate", 0.5)]);

    let result = regulator.regulate().await.unwrap();
    let command = commands.recv().await.unwrap();

    assert_eq!(command.action_type, ActionType::Alert);
    assert_eq!(command.action_type, result.action.action_type);
    assert_eq!(command.magnitude, result.action.magnitude);
}

#[tokio::test(start_paused = true)]
async fn test_failing_sensor_keeps_prior_value() {
    let regulator = regulator(config());
    regulator.sense();
    regulator
        .register_sensor("latency", || anyhow::bail!("probe timed out"))
        .unwrap();

    let state = regulator.sense();

    assert_eq!(state.latency, 0.2);
    assert_eq!(regulator.telemetry().sensor_failures_total.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_setpoint_survives_adaptation() {
    let regulator = regulator(config());
    let before = regulator.setpoints();

    assert!(!regulator.adapt_setpoint(Variable::ErrorRate, 0.5).unwrap());
    assert_eq!(regulator.setpoints(), before);

    assert!(regulator.adapt_setpoint(Variable::Latency, 0.4).unwrap());
    let latency = regulator
        .setpoints()
        .into_iter()
        .find(|sp| sp.variable == Variable::Latency)
        .unwrap();
    assert_eq!(latency.target, 0.4);
}

#[test]
fn test_metrics_serialize() {
    let regulator = regulator(config());
    regulator.sense();
    let json = serde_json::to_value(regulator.get_metrics()).unwrap();
    assert_eq!(json["regulation_count"], 0);
    assert!(json["per_variable_deviation"]["energy"].is_number());
}
