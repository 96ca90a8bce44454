//! Query execution backend: the single capability that runs resolved
//! queries and expressions and returns frames per refId

pub mod http;
pub mod time_range;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::Frame;
use crate::eval::Query;
use crate::models::SignedInUser;

pub use http::{BackendConfig, HttpBackend};
pub use time_range::{TimeRange, TimeRangeError};

/// Executes a batch of queries. Implementations own their connection reuse
/// and must be safe to call concurrently.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError>;
}

/// One dispatch to the backend
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRequest {
    pub time_range: TimeRange,
    pub user: SignedInUser,
    pub queries: Vec<Query>,
    pub debug: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendResponse {
    #[serde(default)]
    pub results: HashMap<String, QueryResult>,
}

impl BackendResponse {
    pub fn with_result(mut self, ref_id: impl Into<String>, result: QueryResult) -> Self {
        self.results.insert(ref_id.into(), result);
        self
    }
}

/// Result for one refId
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub frames: Dataframes,
}

impl QueryResult {
    pub fn frames(frames: Vec<Frame>) -> Self {
        Self {
            error: None,
            frames: Dataframes::Decoded(frames),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            frames: Dataframes::default(),
        }
    }
}

/// Frames as returned by the backend, either ready to use or still encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dataframes {
    Decoded(Vec<Frame>),
    /// JSON-encoded frames, one string per frame
    Encoded(Vec<String>),
    /// Frames in an encoding this crate does not read; kept so the
    /// executor can report them as a decode failure
    Unrecognized(Vec<serde_json::Value>),
}

impl Default for Dataframes {
    fn default() -> Self {
        Dataframes::Decoded(Vec::new())
    }
}

impl Dataframes {
    pub fn encode(frames: &[Frame]) -> Result<Self, serde_json::Error> {
        frames
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map(Dataframes::Encoded)
    }

    pub fn decoded(&self) -> Result<Vec<Frame>, serde_json::Error> {
        match self {
            Dataframes::Decoded(frames) => Ok(frames.clone()),
            Dataframes::Encoded(blobs) => blobs.iter().map(|b| serde_json::from_str(b)).collect(),
            Dataframes::Unrecognized(raw) => raw
                .iter()
                .map(|v| Frame::deserialize(v))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
