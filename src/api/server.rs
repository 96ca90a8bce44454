use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{eval_conditions, eval_definition, health_check, AppState, DatasourceCache};
use crate::backend::{BackendConfig, HttpBackend};
use crate::eval::AlertNg;
use crate::store::MemoryStore;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub eval_timeout_secs: u64,
    pub datasource_cache_ttl_secs: u64,
    /// JSON file seeding definitions, dashboards and datasources
    pub fixtures: Option<PathBuf>,
    pub backend: BackendConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            eval_timeout_secs: 30,
            datasource_cache_ttl_secs: 5,
            fixtures: None,
            backend: BackendConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let parse = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        Self {
            host: std::env::var("ALERTNG_HOST").unwrap_or(defaults.host),
            port: std::env::var("ALERTNG_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            eval_timeout_secs: parse("ALERTNG_EVAL_TIMEOUT_SECS", defaults.eval_timeout_secs),
            datasource_cache_ttl_secs: parse(
                "ALERTNG_DATASOURCE_CACHE_TTL_SECS",
                defaults.datasource_cache_ttl_secs,
            ),
            fixtures: std::env::var("ALERTNG_FIXTURES").ok().map(PathBuf::from),
            backend: BackendConfig::from_env(),
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/alert-definitions/:id/eval", post(eval_definition))
        .route("/api/conditions/eval", post(eval_conditions))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = match &config.fixtures {
        Some(path) => Arc::new(MemoryStore::load_file(path)?),
        None => {
            tracing::warn!("No fixtures configured, starting with empty stores");
            Arc::new(MemoryStore::new())
        }
    };
    let datasources = Arc::new(DatasourceCache::with_config(
        Arc::clone(&store),
        1000,
        Duration::from_secs(config.datasource_cache_ttl_secs),
    ));
    let backend = Arc::new(HttpBackend::new(config.backend.clone())?);

    let state = Arc::new(AppState {
        alert: AlertNg::new(store.clone(), store, datasources.clone(), backend),
        eval_timeout: Duration::from_secs(config.eval_timeout_secs),
        datasource_cache: Some(datasources),
    });

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting alertng server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("alertng server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        BackendError, BackendRequest, BackendResponse, QueryBackend, QueryResult,
    };
    use crate::data::{Field, FieldValues, Frame, Labels};
    use crate::models::{AlertDefinition, Dashboard, DatasourceRef};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::util::ServiceExt;

    /// Returns the same single-value series for refId "B"
    struct StaticBackend {
        values: Vec<(&'static str, Option<f64>)>,
    }

    #[async_trait]
    impl QueryBackend for StaticBackend {
        async fn execute(
            &self,
            _request: &BackendRequest,
        ) -> Result<BackendResponse, BackendError> {
            let frames = self
                .values
                .iter()
                .map(|(job, value)| {
                    let mut labels = Labels::new();
                    labels.insert("job".to_string(), job.to_string());
                    Frame::new("", vec![]).with_field(Field::new(
                        "",
                        labels,
                        FieldValues::NullableFloat64(vec![*value]),
                    ))
                })
                .collect();
            Ok(BackendResponse::default().with_result("B", QueryResult::frames(frames)))
        }
    }

    fn create_test_app(values: Vec<(&'static str, Option<f64>)>) -> Router {
        let store = MemoryStore::new();
        store.insert_definition(AlertDefinition {
            id: 1,
            name: "jobs".into(),
            dashboard_id: 10,
            panel_id: 2,
        });
        store.insert_dashboard(Dashboard {
            id: 10,
            org_id: 1,
            data: json!({"panels": [{"id": 2, "datasource": "prom", "targets": [
                {"refId": "A", "expr": "up"},
                {"refId": "B", "datasource": "__expr__", "type": "reduce"}
            ]}]}),
        });
        store.insert_datasource(DatasourceRef::new(3, 1, "prom", "prometheus"));
        let store = Arc::new(store);
        let datasources = Arc::new(DatasourceCache::new(store.clone()));

        let state = Arc::new(AppState {
            alert: AlertNg::new(
                store.clone(),
                store,
                datasources.clone(),
                Arc::new(StaticBackend { values }),
            ),
            eval_timeout: Duration::from_secs(5),
            datasource_cache: Some(datasources),
        });
        build_router(state)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-org-id", "1")
            .header("x-user-id", "7")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_test_app(vec![]);

        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["datasource_cache"]["hits"], json!(0));
        assert_eq!(body["datasource_cache"]["ttl_secs"], json!(5));
    }

    #[tokio::test]
    async fn test_health_reports_cache_hits() {
        let app = create_test_app(vec![("a", Some(1.0))]);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(post_json("/api/alert-definitions/1/eval", json!({})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let body = body_json(app.oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(body["datasource_cache"]["misses"], json!(1));
        assert_eq!(body["datasource_cache"]["hits"], json!(1));
    }

    #[tokio::test]
    async fn test_eval_definition() {
        let app = create_test_app(vec![("a", Some(3.5)), ("b", Some(0.0))]);

        let response = app
            .oneshot(post_json(
                "/api/alert-definitions/1/eval",
                json!({"from": "now-10m", "to": "now"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["instances"][0]["state"], json!("Critical"));
        assert_eq!(body["instances"][1]["state"], json!("Normal"));
        assert_eq!(body["frame"]["fields"][0]["values"]["data"], json!([false]));
        assert_eq!(body["frame"]["fields"][1]["values"]["data"], json!([true]));
        assert_eq!(body["frame"]["fields"][1]["labels"]["job"], json!("b"));
    }

    #[tokio::test]
    async fn test_eval_unknown_definition() {
        let app = create_test_app(vec![]);

        let response = app
            .oneshot(post_json("/api/alert-definitions/99/eval", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_eval_invalid_time_range() {
        let app = create_test_app(vec![("a", Some(1.0))]);

        let response = app
            .oneshot(post_json(
                "/api/alert-definitions/1/eval",
                json!({"from": "whenever", "to": "now"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_eval_conditions_rejects_empty() {
        let app = create_test_app(vec![]);

        let response = app
            .oneshot(post_json(
                "/api/conditions/eval",
                json!({"condition": "B", "queriesAndExpressions": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_eval_conditions() {
        let app = create_test_app(vec![("a", None)]);
        let query = json!({
            "refId": "B",
            "maxDataPoints": 100,
            "intervalMs": 1000,
            "queryType": "",
            "orgId": 0,
            "model": {"refId": "B", "datasource": "__expr__"},
            "datasource": {"id": 3, "orgId": 1, "name": "prom", "type": "prometheus"}
        });

        let response = app
            .oneshot(post_json(
                "/api/conditions/eval",
                json!({"condition": "B", "queriesAndExpressions": [query], "from": "now-1h"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["instances"][0]["state"],
            json!("Normal")
        );
    }

    #[tokio::test]
    async fn test_missing_condition_is_bad_gateway() {
        let app = create_test_app(vec![]);
        // condition "A" is absent from the backend response
        let response = app
            .oneshot(post_json(
                "/api/conditions/eval",
                json!({"condition": "A", "queriesAndExpressions": [{
                    "refId": "A", "maxDataPoints": 1, "intervalMs": 1, "queryType": "",
                    "orgId": 0, "model": {},
                    "datasource": {"id": 3, "orgId": 1, "name": "prom", "type": "prometheus"}
                }]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
