use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::data::Frame;
use crate::eval::{
    AlertNg, Conditions, EvalError, EvalResult, ExecContext, ExecutionError, ResolutionError,
};
use crate::models::SignedInUser;
use crate::store::{CacheStats, CachedDatasourceResolver, MemoryStore};

/// Datasource cache the server puts in front of its store
pub type DatasourceCache = CachedDatasourceResolver<Arc<MemoryStore>>;

/// Application state shared across handlers
pub struct AppState {
    pub alert: AlertNg,
    /// Deadline applied to every evaluation request
    pub eval_timeout: Duration,
    /// Reported by the health check when present
    pub datasource_cache: Option<Arc<DatasourceCache>>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasource_cache: Option<CacheStats>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        datasource_cache: state.datasource_cache.as_ref().map(|cache| cache.stats()),
    })
}

// ============================================================================
// Evaluation
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalDefinitionRequest {
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_to")]
    pub to: String,
    #[serde(default)]
    pub skip_cache: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalConditionsRequest {
    #[serde(flatten)]
    pub conditions: Conditions,
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_to")]
    pub to: String,
}

fn default_from() -> String {
    "now-5m".to_string()
}

fn default_to() -> String {
    "now".to_string()
}

#[derive(Serialize)]
pub struct EvalResponse {
    pub instances: Vec<EvalResult>,
    /// Single-row table for display
    pub frame: Frame,
}

impl EvalResponse {
    fn new(alert: &AlertNg, instances: Vec<EvalResult>) -> Self {
        let frame = alert.present(&instances);
        Self { instances, frame }
    }
}

/// Org used when the request carries no `X-Org-Id`
pub const DEFAULT_REQUEST_ORG_ID: i64 = 1;

/// Acting user from `X-User-Id` / `X-Org-Id`; authentication happens upstream
fn signed_in_user(headers: &HeaderMap) -> Result<SignedInUser, ApiError> {
    let read = |name: &str| -> Result<Option<i64>, ApiError> {
        headers
            .get(name)
            .map(|value| {
                value
                    .to_str()
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
                    .ok_or_else(|| ApiError::BadRequest(format!("invalid {} header", name)))
            })
            .transpose()
    };
    let org_id = read("x-org-id")?.unwrap_or(DEFAULT_REQUEST_ORG_ID);
    let user_id = read("x-user-id")?.unwrap_or_default();
    Ok(SignedInUser::new(user_id, org_id))
}

pub async fn eval_definition(
    State(state): State<Arc<AppState>>,
    Path(definition_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<EvalDefinitionRequest>,
) -> Result<Json<EvalResponse>, ApiError> {
    let user = signed_in_user(&headers)?;
    let ctx = ExecContext::new(definition_id, user).with_timeout(state.eval_timeout);

    let instances = state
        .alert
        .evaluate_definition(&ctx, &request.from, &request.to, request.skip_cache)
        .await?;

    Ok(Json(EvalResponse::new(&state.alert, instances)))
}

pub async fn eval_conditions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<EvalConditionsRequest>,
) -> Result<Json<EvalResponse>, ApiError> {
    let user = signed_in_user(&headers)?;
    let ctx = ExecContext::new(0, user).with_timeout(state.eval_timeout);

    let instances = state
        .alert
        .evaluate_conditions(&request.conditions, &ctx, &request.from, &request.to)
        .await?;

    Ok(Json(EvalResponse::new(&state.alert, instances)))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unprocessable(String),
    BadGateway(String),
    Timeout(String),
}

impl From<EvalError> for ApiError {
    fn from(err: EvalError) -> Self {
        let message = err.to_string();
        if err.interrupted().is_some() {
            return ApiError::Timeout(message);
        }
        match err {
            EvalError::Resolution(
                ResolutionError::DefinitionNotFound(_)
                | ResolutionError::DashboardNotFound(_)
                | ResolutionError::DatasourceNotFound { .. },
            ) => ApiError::NotFound(message),
            EvalError::Resolution(_) => ApiError::Unprocessable(message),
            EvalError::Validation(_) => ApiError::BadRequest(message),
            EvalError::Execution(ExecutionError::InvalidTimeRange(_)) => {
                ApiError::BadRequest(message)
            }
            EvalError::Execution(_) => ApiError::BadGateway(message),
            EvalError::Shape(_) => ApiError::Unprocessable(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
        };

        if status.is_server_error() {
            tracing::warn!(status = %status, "Evaluation failed: {}", message);
        }

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
