use serde::{Deserialize, Serialize};

use super::executor::ExecutionResult;
use crate::data::{FieldType, Frame, Labels};

/// Health of one instance, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum State {
    Normal,
    Warning,
    Critical,
    Error,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Normal => "Normal",
            State::Warning => "Warning",
            State::Critical => "Critical",
            State::Error => "Error",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one instance (series), identified by its labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalResult {
    pub instance: Labels,
    pub state: State,
}

/// In frame order; the order is whatever the backend returned
pub type EvalResults = Vec<EvalResult>;

/// Classify every frame of `result` into a state.
///
/// Each frame must already be reduced to a single nullable float64 value:
/// one field, one row. Any other shape fails the whole batch. A non-zero
/// value is `Critical`; zero or null is `Normal`. `Warning` and `Error` are
/// never produced here.
pub fn evaluate(result: &ExecutionResult) -> Result<EvalResults, ShapeError> {
    let mut eval_results = Vec::with_capacity(result.results.len());

    for frame in &result.results {
        tracing::debug!(
            definition_id = result.alert_definition_id,
            "Evaluating frame\n{}",
            frame.string_table(5, 5)
        );
        eval_results.push(classify(frame)?);
    }

    Ok(eval_results)
}

fn classify(frame: &Frame) -> Result<EvalResult, ShapeError> {
    let rows = frame.row_len().map_err(|e| ShapeError::RaggedFrame {
        frame: frame.name.clone(),
        reason: e.to_string(),
    })?;
    if rows != 1 {
        return Err(ShapeError::RowCount {
            frame: frame.name.clone(),
            rows,
        });
    }

    let [field] = frame.fields.as_slice() else {
        return Err(ShapeError::FieldCount {
            frame: frame.name.clone(),
            fields: frame.fields.len(),
        });
    };

    if field.field_type() != FieldType::NullableFloat64 {
        return Err(ShapeError::FieldType {
            frame: frame.name.clone(),
            field_type: field.field_type(),
        });
    }

    let state = match field.concrete_at(0).and_then(|v| v.as_f64()) {
        Some(v) if v != 0.0 => State::Critical,
        _ => State::Normal,
    };

    Ok(EvalResult {
        instance: field.labels.clone(),
        state,
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("invalid frame {frame:?}: {reason}")]
    RaggedFrame { frame: String, reason: String },

    #[error("invalid frame {frame:?}: row length {rows}, expected 1")]
    RowCount { frame: String, rows: usize },

    #[error("invalid frame {frame:?}: field length {fields}, expected 1")]
    FieldCount { frame: String, fields: usize },

    #[error("invalid frame {frame:?}: field type {field_type}, expected nullable float64")]
    FieldType { frame: String, field_type: FieldType },
}
