//! Resolve a stored alert definition into a fully specified set of queries
//! and expressions.
//!
//! Queries still live on dashboard panels, so resolution walks from the
//! definition to its dashboard, picks the referenced panel and turns each
//! panel target into a [`Query`]:
//!
//! - a target whose datasource is [`EXPR_DATASOURCE`] is an expression; the
//!   last such target names the condition
//! - the first live target picks the datasource (its own, else the panel
//!   default) and every later target in the panel reuses it
//! - unset model fields are filled with defaults, set ones are kept

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::context::{ExecContext, Interrupted};
use super::EvalError;
use crate::models::{
    DatasourceRef, Panel, Target, DEFAULT_INTERVAL_MS, DEFAULT_MAX_DATA_POINTS, DEFAULT_ORG_ID,
    EXPR_DATASOURCE,
};
use crate::store::{AlertDefinitionStore, DashboardStore, DatasourceResolver, StoreError};

/// A query or expression ready for the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub ref_id: String,
    pub max_data_points: i64,
    pub interval_ms: i64,
    pub query_type: String,
    pub org_id: i64,
    /// Target model annotated with the resolved defaults
    pub model: serde_json::Value,
    pub datasource: DatasourceRef,
}

impl Query {
    /// Build from a panel target, filling unset fields from `ds` and defaults
    pub fn resolve(target: &Target, ds: &DatasourceRef) -> Self {
        let target = target.with_defaults(ds);
        Self {
            ref_id: target.ref_id().to_string(),
            max_data_points: target.max_data_points.unwrap_or(DEFAULT_MAX_DATA_POINTS),
            interval_ms: target.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS),
            query_type: target.query_type.clone().unwrap_or_default(),
            org_id: target.org_id.unwrap_or(DEFAULT_ORG_ID),
            model: target.to_model(),
            datasource: ds.clone(),
        }
    }

    pub fn is_expression(&self) -> bool {
        self.model.get("datasource").and_then(|v| v.as_str()) == Some(EXPR_DATASOURCE)
    }
}

/// The resolved queries and expressions of an alert, plus the refId whose
/// series decides the alert state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conditions {
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub queries_and_expressions: Vec<Query>,
}

impl Conditions {
    pub fn is_valid(&self) -> bool {
        !self.queries_and_expressions.is_empty()
    }

    /// Callers check this before execution
    pub fn validate(&self) -> Result<(), EvalError> {
        if !self.is_valid() {
            return Err(EvalError::Validation(
                "conditions have no queries or expressions".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `condition` names one of the resolved refIds
    pub fn has_condition_query(&self) -> bool {
        self.queries_and_expressions
            .iter()
            .any(|q| q.ref_id == self.condition)
    }

    pub fn ref_ids(&self) -> Vec<&str> {
        self.queries_and_expressions
            .iter()
            .map(|q| q.ref_id.as_str())
            .collect()
    }
}

/// Builds [`Conditions`] from stored definitions and dashboards
#[derive(Clone)]
pub struct ConditionResolver {
    definitions: Arc<dyn AlertDefinitionStore>,
    dashboards: Arc<dyn DashboardStore>,
    datasources: Arc<dyn DatasourceResolver>,
}

impl ConditionResolver {
    pub fn new(
        definitions: Arc<dyn AlertDefinitionStore>,
        dashboards: Arc<dyn DashboardStore>,
        datasources: Arc<dyn DatasourceResolver>,
    ) -> Self {
        Self {
            definitions,
            dashboards,
            datasources,
        }
    }

    /// Resolve the conditions of `definition_id` on behalf of `ctx.user`.
    ///
    /// The result may be empty (no matching panel); check it with
    /// [`Conditions::validate`] before executing.
    pub async fn resolve(
        &self,
        definition_id: i64,
        ctx: &ExecContext,
        skip_cache: bool,
    ) -> Result<Conditions, EvalError> {
        let definition = ctx
            .run(self.definitions.get_definition(definition_id))
            .await
            .map_err(ResolutionError::Interrupted)?
            .map_err(|e| lookup_error(e, ResolutionError::DefinitionNotFound(definition_id)))?;

        let dashboard = ctx
            .run(self.dashboards.get_dashboard(definition.dashboard_id))
            .await
            .map_err(ResolutionError::Interrupted)?
            .map_err(|e| {
                lookup_error(e, ResolutionError::DashboardNotFound(definition.dashboard_id))
            })?;

        let panels = dashboard
            .parse_panels()
            .map_err(|e| ResolutionError::MalformedDashboard(e.to_string()))?;

        let mut conditions = Conditions::default();
        for panel in panels.panels.iter().filter(|p| p.id == definition.panel_id) {
            self.resolve_panel(panel, dashboard.org_id, ctx, skip_cache, &mut conditions)
                .await?;
        }

        if conditions.queries_and_expressions.is_empty() {
            tracing::warn!(
                definition_id,
                dashboard_id = definition.dashboard_id,
                panel_id = definition.panel_id,
                "No queries resolved for alert definition"
            );
        } else if !conditions.has_condition_query() {
            tracing::warn!(
                definition_id,
                condition = %conditions.condition,
                ref_ids = ?conditions.ref_ids(),
                "Condition does not name a resolved query"
            );
        }

        Ok(conditions)
    }

    async fn resolve_panel(
        &self,
        panel: &Panel,
        org_id: i64,
        ctx: &ExecContext,
        skip_cache: bool,
        conditions: &mut Conditions,
    ) -> Result<(), EvalError> {
        let targets = panel
            .parse_targets()
            .map_err(|e| ResolutionError::MalformedDashboard(e.to_string()))?;
        let mut datasource: Option<DatasourceRef> = None;

        for target in &targets {
            if target.is_expression() {
                // last expression wins
                conditions.condition = target.ref_id().to_string();
            } else if datasource.is_none() {
                let name = target
                    .datasource
                    .as_deref()
                    .or(panel.datasource.as_deref())
                    .ok_or_else(|| {
                        EvalError::Validation(format!(
                            "no datasource reference found for target {}",
                            target.ref_id()
                        ))
                    })?;
                datasource = Some(self.lookup_datasource(name, org_id, ctx, skip_cache).await?);
            }

            let Some(ds) = datasource.as_ref() else {
                return Err(EvalError::Validation(format!(
                    "no datasource reference found for target {}",
                    target.ref_id()
                )));
            };

            let query = Query::resolve(target, ds);
            tracing::debug!(
                ref_id = %query.ref_id,
                datasource = %ds.name,
                expression = query.is_expression(),
                max_data_points = query.max_data_points,
                interval_ms = query.interval_ms,
                "Resolved query"
            );
            conditions.queries_and_expressions.push(query);
        }
        Ok(())
    }

    async fn lookup_datasource(
        &self,
        name: &str,
        org_id: i64,
        ctx: &ExecContext,
        skip_cache: bool,
    ) -> Result<DatasourceRef, ResolutionError> {
        let not_found = || ResolutionError::DatasourceNotFound {
            name: name.to_string(),
            org_id,
        };

        let by_name = ctx
            .run(self.datasources.get_datasource_by_name(name, org_id))
            .await
            .map_err(ResolutionError::Interrupted)?
            .map_err(|e| lookup_error(e, not_found()))?;

        let ds = ctx
            .run(
                self.datasources
                    .get_datasource(by_name.id, &ctx.user, skip_cache),
            )
            .await
            .map_err(ResolutionError::Interrupted)?
            .map_err(|e| lookup_error(e, not_found()))?;

        tracing::debug!(datasource = %ds.name, id = ds.id, org_id, skip_cache, "Resolved datasource");
        Ok(ds)
    }
}

fn lookup_error(err: StoreError, not_found: ResolutionError) -> ResolutionError {
    match err {
        StoreError::NotFound { .. } => not_found,
        StoreError::Backend(msg) => ResolutionError::Store(msg),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("alert definition not found: {0}")]
    DefinitionNotFound(i64),

    #[error("dashboard not found: {0}")]
    DashboardNotFound(i64),

    #[error("failed to parse dashboard JSON: {0}")]
    MalformedDashboard(String),

    #[error("datasource {name:?} not found in org {org_id}")]
    DatasourceNotFound { name: String, org_id: i64 },

    #[error("store error: {0}")]
    Store(String),

    #[error("{0}")]
    Interrupted(#[from] Interrupted),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertDefinition, Dashboard, SignedInUser};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    const ORG: i64 = 1;

    fn store_with_panel(panel: serde_json::Value) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_definition(AlertDefinition {
            id: 1,
            name: "cpu".into(),
            dashboard_id: 10,
            panel_id: 2,
        });
        store.insert_dashboard(Dashboard {
            id: 10,
            org_id: ORG,
            data: json!({"panels": [
                {"id": 1, "datasource": "other", "targets": [{"refId": "Z"}]},
                panel
            ]}),
        });
        store.insert_datasource(DatasourceRef::new(3, ORG, "prom", "prometheus"));
        store.insert_datasource(DatasourceRef::new(4, ORG, "loki", "loki"));
        store.insert_datasource(DatasourceRef::new(5, ORG, "other", "graphite"));
        Arc::new(store)
    }

    fn resolver(store: Arc<MemoryStore>) -> ConditionResolver {
        ConditionResolver::new(store.clone(), store.clone(), store)
    }

    fn ctx() -> ExecContext {
        ExecContext::new(1, SignedInUser::new(7, ORG))
    }

    #[tokio::test]
    async fn test_datasource_inherited_from_first_target() {
        let store = store_with_panel(json!({
            "id": 2,
            "datasource": "loki",
            "targets": [
                {"refId": "A", "datasource": "prom", "expr": "up"},
                {"refId": "B", "expr": "rate(x[1m])"},
                {"refId": "C", "datasource": ""}
            ]
        }));

        let conditions = resolver(store).resolve(1, &ctx(), false).await.unwrap();

        assert_eq!(conditions.ref_ids(), vec!["A", "B", "C"]);
        for query in &conditions.queries_and_expressions {
            assert_eq!(query.datasource.name, "prom");
            assert_eq!(query.model["datasource"], json!("prom"));
            assert_eq!(query.model["datasourceId"], json!(3));
        }
    }

    #[tokio::test]
    async fn test_panel_default_datasource() {
        let store = store_with_panel(json!({
            "id": 2,
            "datasource": "loki",
            "targets": [{"expr": "{job=\"a\"}"}]
        }));

        let conditions = resolver(store).resolve(1, &ctx(), false).await.unwrap();
        let query = &conditions.queries_and_expressions[0];
        assert_eq!(query.ref_id, "A");
        assert_eq!(query.datasource.id, 4);
    }

    #[tokio::test]
    async fn test_last_expression_is_condition() {
        let store = store_with_panel(json!({
            "id": 2,
            "targets": [
                {"refId": "A", "datasource": "prom", "expr": "up"},
                {"refId": "B", "datasource": "__expr__", "type": "reduce", "expression": "A"},
                {"refId": "C", "datasource": "__expr__", "type": "math", "expression": "$B > 1"}
            ]
        }));

        let conditions = resolver(store).resolve(1, &ctx(), false).await.unwrap();
        assert_eq!(conditions.condition, "C");
        assert!(conditions.has_condition_query());

        let expr = &conditions.queries_and_expressions[2];
        assert!(expr.is_expression());
        assert_eq!(expr.model["datasource"], json!(EXPR_DATASOURCE));
        assert_eq!(expr.model["expression"], json!("$B > 1"));
    }

    #[tokio::test]
    async fn test_defaults_are_not_destructive() {
        let store = store_with_panel(json!({
            "id": 2,
            "targets": [
                {"refId": "A", "datasource": "prom", "maxDataPoints": 50, "intervalMs": "250", "queryType": "range"},
                {"refId": "B"}
            ]
        }));

        let conditions = resolver(store).resolve(1, &ctx(), false).await.unwrap();
        let a = &conditions.queries_and_expressions[0];
        assert_eq!(a.max_data_points, 50);
        assert_eq!(a.interval_ms, 250);
        assert_eq!(a.query_type, "range");
        assert_eq!(a.model["maxDataPoints"], json!(50));

        let b = &conditions.queries_and_expressions[1];
        assert_eq!(b.max_data_points, 100);
        assert_eq!(b.interval_ms, 1000);
        assert_eq!(b.org_id, 0);
        assert_eq!(b.query_type, "");
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let store = store_with_panel(json!({
            "id": 2,
            "targets": [
                {"refId": "A", "datasource": "prom"},
                {"refId": "B", "datasource": "__expr__"}
            ]
        }));
        let resolver = resolver(store);

        let first = resolver.resolve(1, &ctx(), false).await.unwrap();
        let second = resolver.resolve(1, &ctx(), false).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_no_matching_panel_is_empty() {
        let store = store_with_panel(json!({"id": 99, "targets": []}));

        let conditions = resolver(store).resolve(1, &ctx(), false).await.unwrap();
        assert!(!conditions.is_valid());
        assert!(matches!(conditions.validate(), Err(EvalError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_records() {
        let store = store_with_panel(json!({"id": 2}));
        store.insert_definition(AlertDefinition {
            id: 2,
            name: "orphan".into(),
            dashboard_id: 404,
            panel_id: 2,
        });
        let resolver = resolver(store);

        assert_eq!(
            resolver.resolve(9, &ctx(), false).await,
            Err(EvalError::Resolution(ResolutionError::DefinitionNotFound(9)))
        );
        assert_eq!(
            resolver.resolve(2, &ctx(), false).await,
            Err(EvalError::Resolution(ResolutionError::DashboardNotFound(404)))
        );
    }

    #[tokio::test]
    async fn test_malformed_dashboard() {
        let store = store_with_panel(json!({"id": 2}));
        store.insert_dashboard(Dashboard {
            id: 10,
            org_id: ORG,
            data: json!({"panels": "nope"}),
        });

        assert!(matches!(
            resolver(store).resolve(1, &ctx(), false).await,
            Err(EvalError::Resolution(ResolutionError::MalformedDashboard(_)))
        ));
    }

    #[tokio::test]
    async fn test_other_panels_are_not_decoded() {
        let store = store_with_panel(json!({
            "id": 2,
            "targets": [{"refId": "A", "datasource": "prom"}]
        }));
        store.insert_dashboard(Dashboard {
            id: 10,
            org_id: ORG,
            data: json!({"panels": [
                {"id": 1, "targets": [{"datasource": {"uid": "abc", "type": "loki"}}, 42]},
                {"id": 2, "targets": [{"refId": "A", "datasource": "prom"}]}
            ]}),
        });

        let conditions = resolver(store).resolve(1, &ctx(), false).await.unwrap();
        assert_eq!(conditions.ref_ids(), vec!["A"]);
        assert_eq!(conditions.queries_and_expressions[0].datasource.id, 3);
    }

    #[tokio::test]
    async fn test_malformed_target_on_alert_panel() {
        let store = store_with_panel(json!({"id": 2, "targets": ["up"]}));

        assert!(matches!(
            resolver(store).resolve(1, &ctx(), false).await,
            Err(EvalError::Resolution(ResolutionError::MalformedDashboard(_)))
        ));
    }

    #[tokio::test]
    async fn test_unknown_datasource() {
        let store = store_with_panel(json!({
            "id": 2,
            "targets": [{"refId": "A", "datasource": "influx"}]
        }));

        assert_eq!(
            resolver(store).resolve(1, &ctx(), false).await,
            Err(EvalError::Resolution(ResolutionError::DatasourceNotFound {
                name: "influx".into(),
                org_id: ORG,
            }))
        );
    }

    #[tokio::test]
    async fn test_no_datasource_reference() {
        let store = store_with_panel(json!({
            "id": 2,
            "targets": [{"refId": "A", "expr": "up"}]
        }));
        assert!(matches!(
            resolver(store).resolve(1, &ctx(), false).await,
            Err(EvalError::Validation(_))
        ));

        // an expression ahead of any live query has nothing to inherit
        let store = store_with_panel(json!({
            "id": 2,
            "targets": [
                {"refId": "B", "datasource": "__expr__"},
                {"refId": "A", "datasource": "prom"}
            ]
        }));
        assert!(matches!(
            resolver(store).resolve(1, &ctx(), false).await,
            Err(EvalError::Validation(_))
        ));
    }

    struct SlowStore;

    #[async_trait]
    impl AlertDefinitionStore for SlowStore {
        async fn get_definition(&self, _id: i64) -> Result<AlertDefinition, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(StoreError::Backend("unreachable".into()))
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl AlertDefinitionStore for BrokenStore {
        async fn get_definition(&self, _id: i64) -> Result<AlertDefinition, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_propagate() {
        let store = store_with_panel(json!({"id": 2}));

        let slow = ConditionResolver::new(Arc::new(SlowStore), store.clone(), store.clone());
        let timed = ctx().with_timeout(Duration::from_millis(20));
        assert_eq!(
            slow.resolve(1, &timed, false).await,
            Err(EvalError::Resolution(ResolutionError::Interrupted(
                Interrupted::DeadlineExceeded
            )))
        );

        let broken = ConditionResolver::new(Arc::new(BrokenStore), store.clone(), store);
        assert_eq!(
            broken.resolve(1, &ctx(), false).await,
            Err(EvalError::Resolution(ResolutionError::Store(
                "connection refused".into()
            )))
        );
    }
}
