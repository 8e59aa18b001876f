//! Error types for Allostat
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

use crate::types::state::Variable;

/// Result type alias using AllostatError
pub type Result<T> = std::result::Result<T, AllostatError>;

/// Unified error type for Allostat operations
#[derive(Debug, Error)]
pub enum AllostatError {
    // State access errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    // Setpoint errors
    #[error("Setpoint error: {0}")]
    Setpoint(#[from] SetpointError),

    // Actuator errors
    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised when reading or writing the state snapshot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("Unknown state variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("Non-finite value for {variable}: {value}")]
    NonFinite { variable: Variable, value: f64 },
}

/// Setpoint construction and adaptation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetpointError {
    #[error("No setpoint configured for {0}")]
    NotFound(Variable),

    #[error("Tolerance must be positive for {variable}, got {tolerance}")]
    InvalidTolerance { variable: Variable, tolerance: f64 },

    #[error("Invalid target for {variable}: {target}")]
    InvalidTarget { variable: Variable, target: f64 },

    #[error("Precision must be finite and non-negative for {variable}, got {precision}")]
    InvalidPrecision { variable: Variable, precision: f64 },
}

/// Errors returned across the actuator dispatch boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActuatorError {
    #[error("Action rejected by actuator: {0}")]
    Rejected(String),

    #[error("Actuator channel closed")]
    ChannelClosed,

    #[error("Dispatch failed: {0}")]
    Failed(String),
}

impl From<anyhow::Error> for AllostatError {
    fn from(err: anyhow::Error) -> Self {
        AllostatError::Internal(err.to_string())
    }
}
