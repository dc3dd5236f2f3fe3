use crate::types::Step;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Unknown policy type '{0}'")]
    UnknownPolicy(String),

    #[error("Policy '{policy}' requires parameter '{name}'")]
    MissingParameter { policy: &'static str, name: &'static str },

    #[error("Policy '{policy}' does not accept parameter '{name}'")]
    UnknownParameter { policy: &'static str, name: String },

    #[error("Parameter '{name}' = {value} outside [{min}, {max}]")]
    ParameterOutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invariant violated at step {step}: {detail}")]
    InvariantViolation { step: Step, detail: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    /// True for the errors raised by validation before a run starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownPolicy(_)
                | Self::MissingParameter { .. }
                | Self::UnknownParameter { .. }
                | Self::ParameterOutOfRange { .. }
                | Self::InvalidConfig(_)
        )
    }
}

pub type SimResult<T> = Result<T, SimError>;
