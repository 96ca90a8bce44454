use async_trait::async_trait;
use std::time::Duration;

use super::{BackendError, BackendRequest, BackendResponse, QueryBackend};

/// Remote query service settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the query service, e.g. http://127.0.0.1:3000
    pub base_url: String,
    pub timeout: Duration,
    pub basic_auth_user: Option<String>,
    pub basic_auth_password: Option<String>,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Read from the environment
    /// ALERTNG_BACKEND_URL=http://127.0.0.1:3000
    /// ALERTNG_BACKEND_TIMEOUT_SECS=30
    /// ALERTNG_BACKEND_USER / ALERTNG_BACKEND_PASSWORD for basic auth
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("ALERTNG_BACKEND_URL").unwrap_or(defaults.base_url);
        let timeout = std::env::var("ALERTNG_BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            base_url,
            timeout,
            basic_auth_user: std::env::var("ALERTNG_BACKEND_USER").ok(),
            basic_auth_password: std::env::var("ALERTNG_BACKEND_PASSWORD").ok(),
        }
    }

    pub fn query_url(&self) -> String {
        format!("{}/api/ds/query", self.base_url.trim_end_matches('/'))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout: Duration::from_secs(30),
            basic_auth_user: None,
            basic_auth_password: None,
        }
    }
}

/// Query backend that posts the batch to a remote query service.
/// The reqwest client is shared across concurrent evaluations.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http_client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            config,
        })
    }
}

/// Body of a query service request
fn build_body(request: &BackendRequest) -> serde_json::Value {
    let queries: Vec<serde_json::Value> = request
        .queries
        .iter()
        .map(|q| {
            let mut model = match &q.model {
                serde_json::Value::Object(map) => map.clone(),
                _ => serde_json::Map::new(),
            };
            model.insert("refId".into(), q.ref_id.clone().into());
            model.insert("maxDataPoints".into(), q.max_data_points.into());
            model.insert("intervalMs".into(), q.interval_ms.into());
            model
                .entry("datasourceId")
                .or_insert_with(|| q.datasource.id.into());
            serde_json::Value::Object(model)
        })
        .collect();

    serde_json::json!({
        "from": request.time_range.from_ms.to_string(),
        "to": request.time_range.to_ms.to_string(),
        "queries": queries,
        "debug": request.debug,
    })
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        let url = self.config.query_url();

        let mut req = self
            .http_client
            .post(&url)
            .header("X-Grafana-Org-Id", request.user.org_id.to_string())
            .json(&build_body(request));
        if let Some(user) = &self.config.basic_auth_user {
            req = req.basic_auth(user, self.config.basic_auth_password.as_ref());
        }

        let response = req
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: BackendResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Deserialization(e.to_string()))?;

        tracing::debug!(
            url = %url,
            queries = request.queries.len(),
            results = parsed.results.len(),
            "Query service responded"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TimeRange;
    use crate::eval::Query;
    use crate::models::{DatasourceRef, SignedInUser};
    use serde_json::json;

    #[test]
    fn test_query_url() {
        assert_eq!(
            BackendConfig::new("http://grafana:3000/").query_url(),
            "http://grafana:3000/api/ds/query"
        );
        assert_eq!(BackendConfig::default().timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_build_body() {
        let request = BackendRequest {
            time_range: TimeRange::parse("1000", "2000").unwrap(),
            user: SignedInUser::new(1, 1),
            queries: vec![Query {
                ref_id: "A".into(),
                max_data_points: 100,
                interval_ms: 1000,
                query_type: String::new(),
                org_id: 0,
                model: json!({"refId": "A", "expr": "up", "datasourceId": 3}),
                datasource: DatasourceRef::new(3, 1, "prom", "prometheus"),
            }],
            debug: true,
        };

        let body = build_body(&request);
        assert_eq!(body["from"], json!("1000"));
        assert_eq!(body["to"], json!("2000"));
        assert_eq!(body["queries"][0]["expr"], json!("up"));
        assert_eq!(body["queries"][0]["maxDataPoints"], json!(100));
        assert_eq!(body["queries"][0]["datasourceId"], json!(3));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let backend = HttpBackend::new(BackendConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        let request = BackendRequest {
            time_range: TimeRange::parse("now-1h", "now").unwrap(),
            user: SignedInUser::new(1, 1),
            queries: vec![],
            debug: false,
        };

        assert!(matches!(
            backend.execute(&request).await,
            Err(BackendError::Network(_))
        ));
    }
}
