//! Actuator dispatch boundary
//!
//! The regulator hands exactly one action per cycle to an injected
//! [`Actuator`]. What the action ultimately does (throttling a scheduler,
//! releasing memory, paging an operator) lives behind this trait.

use allostat_common::{Action, ActionType, ActuatorError, Variable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

/// Payload handed across the dispatch boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub action_type: ActionType,
    pub target: Variable,
    pub magnitude: f64,
    pub urgency: f64,
    pub reason: String,
}

impl From<&Action> for ActuatorCommand {
    fn from(action: &Action) -> Self {
        Self {
            action_type: action.action_type,
            target: action.target,
            magnitude: action.magnitude,
            urgency: action.urgency,
            reason: action.reason.clone(),
        }
    }
}

/// Carries out regulation actions
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn dispatch(&self, command: ActuatorCommand) -> Result<(), ActuatorError>;
}

/// Logs each command and reports success
#[derive(Debug, Default, Clone)]
pub struct LoggingActuator;

#[async_trait]
impl Actuator for LoggingActuator {
    async fn dispatch(&self, command: ActuatorCommand) -> Result<(), ActuatorError> {
        info!(
            action = %command.action_type,
            target = %command.target,
            magnitude = command.magnitude,
            reason = %command.reason,
            "Regulation action dispatched"
        );
        Ok(())
    }
}

/// Forwards commands to an mpsc channel for an external executor
#[derive(Debug, Clone)]
pub struct ChannelActuator {
    tx: mpsc::Sender<ActuatorCommand>,
}

impl ChannelActuator {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ActuatorCommand>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Actuator for ChannelActuator {
    async fn dispatch(&self, command: ActuatorCommand) -> Result<(), ActuatorError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ActuatorError::ChannelClosed)
    }
}
