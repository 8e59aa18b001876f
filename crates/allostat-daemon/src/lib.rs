//! # Allostat Daemon
//!
//! Hosts a [`Regulator`] and triggers it on a fixed interval. Triggers that
//! land while a cycle is still settling are dropped by the regulator.

pub mod config;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use allostat_regulator::Regulator;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Drive `regulator` every `interval` until `shutdown` resolves
///
/// Returns the number of triggers issued. Each trigger runs on its own task so
/// a settling cycle never delays the schedule.
pub async fn run<F>(regulator: Arc<Regulator>, interval: Duration, shutdown: F) -> u64
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut triggers = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(triggers, "Shutdown requested, stopping regulation loop");
                regulator.shutdown();
                return triggers;
            }
            _ = ticker.tick() => {
                triggers += 1;
                let regulator = regulator.clone();
                tokio::spawn(async move {
                    if let Some(result) = regulator.regulate().await {
                        debug!(
                            action = %result.action.action_type,
                            success = result.success,
                            "Cycle finished"
                        );
                    }
                });
            }
        }
    }
}
