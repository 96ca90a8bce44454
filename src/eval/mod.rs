//! Alert condition evaluation: resolve, execute, evaluate, present

pub mod conditions;
pub mod context;
pub mod evaluator;
pub mod executor;
pub mod presenter;
pub mod service;

pub use conditions::{ConditionResolver, Conditions, Query, ResolutionError};
pub use context::{ExecContext, Interrupted};
pub use evaluator::{evaluate, EvalResult, EvalResults, ShapeError, State};
pub use executor::{ExecutionError, ExecutionResult, FailedExecution, QueryExecutor};
pub use presenter::present;
pub use service::AlertNg;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),
}

impl From<FailedExecution> for EvalError {
    fn from(failed: FailedExecution) -> Self {
        EvalError::Execution(failed.error)
    }
}

impl EvalError {
    /// The interruption behind this error, if it was cancelled or timed out
    pub fn interrupted(&self) -> Option<Interrupted> {
        match self {
            EvalError::Resolution(ResolutionError::Interrupted(i))
            | EvalError::Execution(ExecutionError::Interrupted(i)) => Some(*i),
            _ => None,
        }
    }
}
