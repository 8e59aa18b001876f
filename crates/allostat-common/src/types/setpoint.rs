//! Setpoints - target bands for regulated variables
//!
//! A setpoint triggers need detection when a current or forecast value leaves
//! `target ± tolerance`. Only adaptive setpoints may have their target moved
//! after construction.

use serde::{Deserialize, Serialize};

use crate::error::SetpointError;
use crate::types::state::Variable;

/// Target value plus tolerance band for one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setpoint {
    /// Regulated variable
    pub variable: Variable,
    /// Desired value
    pub target: f64,
    /// Half-width of the acceptable band (> 0)
    pub tolerance: f64,
    /// Relative importance, also used as preference precision
    pub priority: u32,
    /// Whether the target may be adapted at runtime
    pub adaptive: bool,
}

impl Setpoint {
    /// Create a validated setpoint
    pub fn new(
        variable: Variable,
        target: f64,
        tolerance: f64,
        priority: u32,
        adaptive: bool,
    ) -> Result<Self, SetpointError> {
        let setpoint = Self {
            variable,
            target,
            tolerance,
            priority,
            adaptive,
        };
        setpoint.validate()?;
        Ok(setpoint)
    }

    pub fn validate(&self) -> Result<(), SetpointError> {
        if !(self.tolerance > 0.0) || !self.tolerance.is_finite() {
            return Err(SetpointError::InvalidTolerance {
                variable: self.variable,
                tolerance: self.tolerance,
            });
        }
        if !self.target.is_finite() {
            return Err(SetpointError::InvalidTarget {
                variable: self.variable,
                target: self.target,
            });
        }
        Ok(())
    }

    /// Absolute distance from target
    #[inline]
    pub fn deviation(&self, value: f64) -> f64 {
        (value - self.target).abs()
    }

    /// Whether `value` lies outside the band
    #[inline]
    pub fn is_violated(&self, value: f64) -> bool {
        self.deviation(value) > self.tolerance
    }

    /// Reference defaults for the six normalized variables
    pub fn reference_defaults() -> Vec<Setpoint> {
        vec![
            Self::preset(Variable::Energy, 0.7, 0.2, 1, true),
            Self::preset(Variable::ComputationalLoad, 0.5, 0.3, 2, true),
            Self::preset(Variable::ThermalState, 0.3, 0.2, 1, false),
            Self::preset(Variable::ErrorRate, 0.0, 0.1, 1, false),
            Self::preset(Variable::Latency, 0.2, 0.3, 2, true),
            Self::preset(Variable::MemoryPressure, 0.5, 0.3, 2, true),
        ]
    }

    const fn preset(
        variable: Variable,
        target: f64,
        tolerance: f64,
        priority: u32,
        adaptive: bool,
    ) -> Self {
        Self {
            variable,
            target,
            tolerance,
            priority,
            adaptive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_tolerance() {
        assert!(Setpoint::new(Variable::Energy, 0.5, 0.0, 1, true).is_err());
        assert!(Setpoint::new(Variable::Energy, 0.5, -0.1, 1, true).is_err());
        assert!(Setpoint::new(Variable::Energy, 0.5, f64::NAN, 1, true).is_err());
        assert!(Setpoint::new(Variable::Energy, 0.5, 0.1, 1, true).is_ok());
    }

    #[test]
    fn test_rejects_non_finite_target() {
        let err = Setpoint::new(Variable::Energy, f64::INFINITY, 0.1, 1, true).unwrap_err();
        assert!(matches!(err, SetpointError::InvalidTarget { .. }));
    }

    #[test]
    fn test_violation_is_strict() {
        let sp = Setpoint::new(Variable::Latency, 0.2, 0.25, 2, true).unwrap();
        assert!(!sp.is_violated(0.4));
        assert!(!sp.is_violated(0.0));
        assert!(sp.is_violated(0.5));
        assert!(sp.is_violated(-0.1));
    }

    #[test]
    fn test_reference_defaults_are_valid() {
        let defaults = Setpoint::reference_defaults();
        assert_eq!(defaults.len(), 6);
        assert!(defaults.iter().all(|s| s.validate().is_ok()));
        let thermal = defaults
            .iter()
            .find(|s| s.variable == Variable::ThermalState)
            .unwrap();
        assert!(!thermal.adaptive);
    }
}
