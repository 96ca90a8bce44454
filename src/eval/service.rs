use std::sync::Arc;

use super::conditions::{ConditionResolver, Conditions};
use super::context::ExecContext;
use super::evaluator::{evaluate, EvalResults, ShapeError};
use super::executor::{ExecutionResult, FailedExecution, QueryExecutor};
use super::presenter::present;
use super::EvalError;
use crate::backend::QueryBackend;
use crate::data::Frame;
use crate::store::{AlertDefinitionStore, DashboardStore, DatasourceResolver};

/// The evaluation pipeline with its collaborators wired in.
///
/// Holds no per-evaluation state; one instance serves concurrent requests.
#[derive(Clone)]
pub struct AlertNg {
    resolver: ConditionResolver,
    executor: QueryExecutor,
}

impl AlertNg {
    pub fn new(
        definitions: Arc<dyn AlertDefinitionStore>,
        dashboards: Arc<dyn DashboardStore>,
        datasources: Arc<dyn DatasourceResolver>,
        backend: Arc<dyn QueryBackend>,
    ) -> Self {
        Self {
            resolver: ConditionResolver::new(definitions, dashboards, datasources),
            executor: QueryExecutor::new(backend),
        }
    }

    pub async fn resolve_conditions(
        &self,
        definition_id: i64,
        ctx: &ExecContext,
        skip_cache: bool,
    ) -> Result<Conditions, EvalError> {
        self.resolver.resolve(definition_id, ctx, skip_cache).await
    }

    pub async fn execute_conditions(
        &self,
        conditions: &Conditions,
        ctx: &ExecContext,
        from: &str,
        to: &str,
    ) -> Result<ExecutionResult, FailedExecution> {
        self.executor.execute(conditions, ctx, from, to).await
    }

    pub fn evaluate(&self, result: &ExecutionResult) -> Result<EvalResults, ShapeError> {
        evaluate(result)
    }

    pub fn present(&self, eval_results: &EvalResults) -> Frame {
        present(eval_results)
    }

    /// Validate, execute and evaluate already resolved conditions
    pub async fn evaluate_conditions(
        &self,
        conditions: &Conditions,
        ctx: &ExecContext,
        from: &str,
        to: &str,
    ) -> Result<EvalResults, EvalError> {
        conditions.validate()?;
        let result = self.execute_conditions(conditions, ctx, from, to).await?;
        Ok(evaluate(&result)?)
    }

    /// Full pipeline for `ctx.alert_definition_id`
    pub async fn evaluate_definition(
        &self,
        ctx: &ExecContext,
        from: &str,
        to: &str,
        skip_cache: bool,
    ) -> Result<EvalResults, EvalError> {
        let conditions = self
            .resolve_conditions(ctx.alert_definition_id, ctx, skip_cache)
            .await?;
        let results = self.evaluate_conditions(&conditions, ctx, from, to).await?;

        tracing::info!(
            definition_id = ctx.alert_definition_id,
            condition = %conditions.condition,
            instances = results.len(),
            firing = results.iter().filter(|r| r.state != super::State::Normal).count(),
            "Evaluated alert definition"
        );
        Ok(results)
    }
}
