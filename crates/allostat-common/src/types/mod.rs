//! Core data types for Allostat

pub mod action;
pub mod prediction;
pub mod setpoint;
pub mod state;
