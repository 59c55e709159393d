//! Validation errors for model types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Malformed detection at index {index}: {reason}")]
    MalformedDetection { index: usize, reason: String },

    #[error("Invalid interval [{start_time}, {end_time}]: {reason}")]
    InvalidInterval {
        start_time: f64,
        end_time: f64,
        reason: String,
    },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Unknown clustering profile: {0}")]
    UnknownProfile(String),
}

impl ModelError {
    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedDetection {
            index,
            reason: reason.into(),
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
