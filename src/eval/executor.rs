use serde::Serialize;
use std::sync::Arc;

use super::conditions::Conditions;
use super::context::{ExecContext, Interrupted};
use crate::backend::{BackendRequest, QueryBackend, TimeRange};
use crate::data::Frame;

/// Outcome of one execution: the frames of the condition refId, or the error
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub alert_definition_id: i64,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ExecutionError>,
    pub results: Vec<Frame>,
}

impl ExecutionResult {
    pub fn new(alert_definition_id: i64) -> Self {
        Self {
            alert_definition_id,
            ..Default::default()
        }
    }
}

fn serialize_error<S>(error: &Option<ExecutionError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// A failed execution. `result.error` holds the same error, so callers can
/// persist the result and handle the error independently.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct FailedExecution {
    pub result: ExecutionResult,
    pub error: ExecutionError,
}

/// Dispatches resolved conditions to the query backend
#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn QueryBackend>,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }

    /// Run every query and expression of `conditions` over `[from, to]` in a
    /// single backend request and keep the frames of `conditions.condition`.
    ///
    /// Expressions are passed through as-is; the backend interprets them.
    /// A condition refId missing from the response is an error.
    pub async fn execute(
        &self,
        conditions: &Conditions,
        ctx: &ExecContext,
        from: &str,
        to: &str,
    ) -> Result<ExecutionResult, FailedExecution> {
        let mut result = ExecutionResult::new(ctx.alert_definition_id);

        let time_range = match TimeRange::parse(from, to) {
            Ok(range) => range,
            Err(e) => return Err(fail(result, ExecutionError::InvalidTimeRange(e.to_string()))),
        };

        let request = BackendRequest {
            time_range,
            user: ctx.user.clone(),
            queries: conditions.queries_and_expressions.clone(),
            debug: true,
        };

        let response = match ctx.run(self.backend.execute(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(
                    definition_id = ctx.alert_definition_id,
                    error = %e,
                    "Query backend failed"
                );
                return Err(fail(result, ExecutionError::Backend(e.to_string())));
            }
            Err(interrupted) => {
                return Err(fail(result, ExecutionError::Interrupted(interrupted)));
            }
        };

        let Some(condition_result) = response.results.get(&conditions.condition) else {
            return Err(fail(
                result,
                ExecutionError::ConditionNotFound(conditions.condition.clone()),
            ));
        };

        if let Some(message) = &condition_result.error {
            return Err(fail(
                result,
                ExecutionError::QueryFailed {
                    ref_id: conditions.condition.clone(),
                    message: message.clone(),
                },
            ));
        }

        result.results = match condition_result.frames.decoded() {
            Ok(frames) => frames,
            Err(e) => return Err(fail(result, ExecutionError::Decode(e.to_string()))),
        };

        tracing::debug!(
            definition_id = ctx.alert_definition_id,
            condition = %conditions.condition,
            frames = result.results.len(),
            "Executed conditions"
        );
        Ok(result)
    }
}

fn fail(mut result: ExecutionResult, error: ExecutionError) -> FailedExecution {
    result.error = Some(error.clone());
    FailedExecution { result, error }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("query backend failed: {0}")]
    Backend(String),

    #[error("condition {0:?} not found in backend response")]
    ConditionNotFound(String),

    #[error("query {ref_id} failed: {message}")]
    QueryFailed { ref_id: String, message: String },

    #[error("failed to decode frames: {0}")]
    Decode(String),

    #[error("{0}")]
    Interrupted(#[from] Interrupted),
}
