//! Anticipatory model module
pub mod model;

pub use self::model::{
    needs_from, step_confidence, AnticipatoryModel, ModelAccuracy, PredictionError,
};
