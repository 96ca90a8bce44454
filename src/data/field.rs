use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value::Value;

/// Label set identifying one series (instance)
pub type Labels = BTreeMap<String, String>;

/// Typed value storage for a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum FieldValues {
    Bool(Vec<bool>),
    NullableBool(Vec<Option<bool>>),
    Int64(Vec<i64>),
    NullableInt64(Vec<Option<i64>>),
    Float64(Vec<f64>),
    NullableFloat64(Vec<Option<f64>>),
    String(Vec<String>),
    NullableString(Vec<Option<String>>),
    /// Epoch milliseconds
    Time(Vec<i64>),
    NullableTime(Vec<Option<i64>>),
}

/// Field value type, used for shape checks and display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Bool,
    NullableBool,
    Int64,
    NullableInt64,
    Float64,
    NullableFloat64,
    String,
    NullableString,
    Time,
    NullableTime,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::NullableBool => "nullable bool",
            FieldType::Int64 => "int64",
            FieldType::NullableInt64 => "nullable int64",
            FieldType::Float64 => "float64",
            FieldType::NullableFloat64 => "nullable float64",
            FieldType::String => "string",
            FieldType::NullableString => "nullable string",
            FieldType::Time => "time",
            FieldType::NullableTime => "nullable time",
        };
        f.write_str(name)
    }
}

impl FieldValues {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValues::Bool(_) => FieldType::Bool,
            FieldValues::NullableBool(_) => FieldType::NullableBool,
            FieldValues::Int64(_) => FieldType::Int64,
            FieldValues::NullableInt64(_) => FieldType::NullableInt64,
            FieldValues::Float64(_) => FieldType::Float64,
            FieldValues::NullableFloat64(_) => FieldType::NullableFloat64,
            FieldValues::String(_) => FieldType::String,
            FieldValues::NullableString(_) => FieldType::NullableString,
            FieldValues::Time(_) => FieldType::Time,
            FieldValues::NullableTime(_) => FieldType::NullableTime,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FieldValues::Bool(v) => v.len(),
            FieldValues::NullableBool(v) => v.len(),
            FieldValues::Int64(v) => v.len(),
            FieldValues::NullableInt64(v) => v.len(),
            FieldValues::Float64(v) => v.len(),
            FieldValues::NullableFloat64(v) => v.len(),
            FieldValues::String(v) => v.len(),
            FieldValues::NullableString(v) => v.len(),
            FieldValues::Time(v) => v.len(),
            FieldValues::NullableTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get value at index; out of range and null slots both read as `Value::Null`
    pub fn get(&self, index: usize) -> Value {
        match self {
            FieldValues::Bool(v) => v.get(index).copied().map(Value::Bool),
            FieldValues::NullableBool(v) => v.get(index).copied().flatten().map(Value::Bool),
            FieldValues::Int64(v) => v.get(index).copied().map(Value::Int64),
            FieldValues::NullableInt64(v) => v.get(index).copied().flatten().map(Value::Int64),
            FieldValues::Float64(v) => v.get(index).copied().map(Value::Float64),
            FieldValues::NullableFloat64(v) => {
                v.get(index).copied().flatten().map(Value::Float64)
            }
            FieldValues::String(v) => v.get(index).cloned().map(Value::String),
            FieldValues::NullableString(v) => v.get(index).cloned().flatten().map(Value::String),
            FieldValues::Time(v) => v.get(index).copied().map(Value::Time),
            FieldValues::NullableTime(v) => v.get(index).copied().flatten().map(Value::Time),
        }
        .unwrap_or(Value::Null)
    }
}

/// A named, labeled column of typed values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Field {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    pub values: FieldValues,
}

impl Field {
    pub fn new(name: impl Into<String>, labels: Labels, values: FieldValues) -> Self {
        Self {
            name: name.into(),
            labels,
            values,
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.values.field_type()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Value {
        self.values.get(index)
    }

    /// Value at index, or `None` when the slot is null or out of range
    pub fn concrete_at(&self, index: usize) -> Option<Value> {
        match self.get(index) {
            Value::Null => None,
            value => Some(value),
        }
    }
}
