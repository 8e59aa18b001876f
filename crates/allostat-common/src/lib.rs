//! # Allostat Common
//!
//! Shared types, errors, and bounded collections for the Allostat predictive
//! regulation controller.
//!
//! ## Core Types
//!
//! - [`InternalState`]: per-cycle snapshot of the regulated variables
//! - [`Variable`]: validated key for snapshot fields
//! - [`Setpoint`]: target band for one variable
//! - [`Prediction`]/[`FutureNeed`]: forecast outputs
//! - [`Action`]/[`RegulationResult`]: regulation decisions and outcomes
//!
//! ## Collections
//!
//! - [`BoundedBuffer`]: capped FIFO window
//! - [`BoundedMap`]: insertion-ordered map with watermark eviction

pub mod bounded;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use bounded::{BoundedBuffer, BoundedMap};
pub use error::{ActuatorError, AllostatError, Result, SetpointError, StateError};
pub use types::{
    action::{Action, ActionType, RegulationResult},
    prediction::{FutureNeed, NeedDirection, Prediction, StateValues, CONFIDENCE_FLOOR},
    setpoint::Setpoint,
    state::{clamp01, InternalState, Variable},
};

/// Allostat version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default forecast horizon in milliseconds
pub const DEFAULT_PREDICTION_HORIZON_MS: u64 = 10_000;

/// Forecast step width in milliseconds
pub const PREDICTION_STEP_MS: u64 = 1_000;

/// Default snapshot history length
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Cap for the prediction buffer and the result history
pub const DEFAULT_BUFFER_SIZE: usize = 100;
