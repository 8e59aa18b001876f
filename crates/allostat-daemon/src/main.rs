//! Allostat daemon binary

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use allostat_daemon::config::DaemonConfig;
use allostat_regulator::{LoggingActuator, Regulator, RegulatorEvent};

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::load()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Allostat daemon v{}", allostat_common::VERSION);
    info!(
        interval_ms = config.regulation_interval_ms,
        horizon_ms = config.regulator.prediction_horizon_ms,
        settle_delay_ms = config.regulator.settle_delay_ms,
        "Loaded configuration"
    );

    let regulator = Arc::new(Regulator::new(
        config.regulator.clone(),
        Arc::new(LoggingActuator),
    )?);

    let registry = Registry::new();
    regulator
        .telemetry()
        .register(&registry)
        .context("Failed to register regulator metrics")?;

    let mut events = regulator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let RegulatorEvent::SetpointAdapted { variable, new_target, .. } = event {
                info!(variable = %variable, new_target, "Setpoint adapted");
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal");
    };

    allostat_daemon::run(
        regulator.clone(),
        Duration::from_millis(config.regulation_interval_ms),
        shutdown,
    )
    .await;

    let metrics = regulator.get_metrics();
    info!("Final metrics: {}", serde_json::to_string(&metrics)?);
    info!(
        "Model accuracy: {}",
        serde_json::to_string(&regulator.model_accuracy())?
    );

    if config.dump_metrics_on_exit {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        println!("{}", String::from_utf8_lossy(&buffer));
    }

    info!("Allostat daemon stopped");
    Ok(())
}
