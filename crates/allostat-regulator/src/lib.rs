//! # Allostat Regulator
//!
//! Anticipatory regulation engine for a running system's internal resources.
//!
//! ## Cycle
//!
//! ```text
//! sense → forecast → future needs → candidates → EFE selection
//!       → dispatch → settle → re-sense → model feedback
//! ```
//!
//! ## Action Selection
//!
//! ```text
//! EFE = −pragmatic − epistemic + ambiguity + risk
//! ```
//!
//! Where:
//! - pragmatic: precision-weighted reduction in squared distance to preferences
//! - epistemic: forecast uncertainty resolved by the action
//! - ambiguity: mean shortfall of forecast confidence, `mean(1 − confidence)`
//! - risk: standard deviation of forecast confidence
//!
//! The candidate with the lowest EFE is dispatched; ties keep the earlier
//! candidate.

pub mod actuator;
pub mod anticipation;
pub mod clock;
pub mod config;
pub mod controller;
pub mod interoception;
pub mod metrics;
pub mod orchestrator;
pub mod telemetry;

pub use actuator::{Actuator, ActuatorCommand, ChannelActuator, LoggingActuator};
pub use anticipation::{AnticipatoryModel, ModelAccuracy, PredictionError};
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::RegulatorConfig;
pub use controller::{
    ActiveInferenceController, CandidateGenerator, CandidateRules, ExpectedFreeEnergy,
    Preference, ScoredAction,
};
pub use interoception::{Anomaly, InteroceptionEngine};
pub use metrics::RegulationMetrics;
pub use orchestrator::{Regulator, RegulatorEvent};
pub use telemetry::RegulatorTelemetry;
