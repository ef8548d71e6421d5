//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised while validating a quasi-steady-state run.
///
/// All of these are detected before the first time step, so the network is
/// never touched when one of them is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("duration must be positive and finite, got {0}")]
    NonPositiveDuration(f64),

    #[error("time step must be positive and finite, got {0}")]
    NonPositiveTimeStep(f64),

    #[error("time step {time_step} exceeds duration {duration}")]
    TimeStepExceedsDuration { time_step: f64, duration: f64 },

    #[error("fault onset must be non-negative, got {0}")]
    NegativeFaultOnset(f64),

    #[error("fault duration must be non-negative, got {0}")]
    NegativeFaultDuration(f64),

    #[error("fault multiplier must be positive and finite, got {0}")]
    InvalidMultiplier(f64),

    #[error("fault load index {index} out of range ({count} loads)")]
    FaultLoadOutOfRange { index: usize, count: usize },

    #[error("fault load {0} is out of service")]
    FaultLoadOutOfService(usize),

    #[error("no in-service load connected to bus {0}")]
    NoLoadAtBus(i64),

    #[error("run would take {steps} steps, more than the limit of {max}")]
    TooManySteps { steps: f64, max: usize },

    #[error("invalid load variation: {what}")]
    InvalidVariation { what: &'static str },
}

/// Errors reported by a single power flow solve.
///
/// The time-series driver treats every variant as a non-converged step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowerFlowError {
    #[error("network has no in-service external grid (slack bus)")]
    NoSlack,

    #[error("network has no buses")]
    EmptyNetwork,

    #[error("{element} refers to bus {bus} which does not exist")]
    BusOutOfRange { element: &'static str, bus: i64 },

    #[error("{element} has invalid parameters: {what}")]
    InvalidElement {
        element: &'static str,
        what: &'static str,
    },

    #[error("jacobian is singular")]
    SingularJacobian,

    #[error("did not converge after {iterations} iterations (mismatch {mismatch:e})")]
    NotConverged { iterations: usize, mismatch: f64 },

    #[error("iteration diverged (non-finite mismatch)")]
    Diverged,
}

/// Errors raised while loading case files.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("case is missing the `{0}` table")]
    MissingTable(&'static str),

    #[error("malformed pandapower table `{table}`: {what}")]
    Malformed { table: String, what: String },
}

pub type PfResult<T> = Result<T, PowerFlowError>;
