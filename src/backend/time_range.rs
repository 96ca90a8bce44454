//! Evaluation time ranges given as `now`, `now-<n><unit>` or epoch millis

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

fn relative_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^now(?:-(\d+)([smhdw]))?$").expect("relative time pattern compiles")
    })
}

/// A resolved time range; keeps the raw input for the backend request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub from: String,
    pub to: String,
    pub from_ms: i64,
    pub to_ms: i64,
}

impl TimeRange {
    pub fn parse(from: &str, to: &str) -> Result<Self, TimeRangeError> {
        Self::parse_at(from, to, Utc::now())
    }

    /// Parse relative to a fixed `now`
    pub fn parse_at(from: &str, to: &str, now: DateTime<Utc>) -> Result<Self, TimeRangeError> {
        let from_ms = parse_instant(from, now)?;
        let to_ms = parse_instant(to, now)?;
        if from_ms > to_ms {
            return Err(TimeRangeError::Inverted {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            from_ms,
            to_ms,
        })
    }

    pub fn duration_ms(&self) -> i64 {
        self.to_ms - self.from_ms
    }
}

fn parse_instant(raw: &str, now: DateTime<Utc>) -> Result<i64, TimeRangeError> {
    let raw = raw.trim();
    if let Some(caps) = relative_pattern().captures(raw) {
        let Some(amount) = caps.get(1) else {
            return Ok(now.timestamp_millis());
        };
        let amount: i64 = amount
            .as_str()
            .parse()
            .map_err(|_| TimeRangeError::Invalid(raw.to_string()))?;
        let offset = match &caps[2] {
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            "w" => Duration::try_weeks(amount),
            _ => None,
        }
        .ok_or_else(|| TimeRangeError::Invalid(raw.to_string()))?;
        return Ok((now - offset).timestamp_millis());
    }

    if let Ok(millis) = raw.parse::<i64>() {
        return Ok(millis);
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| TimeRangeError::Invalid(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeRangeError {
    #[error("Invalid time {0:?}")]
    Invalid(String),

    #[error("Time range starts after it ends: {from} to {to}")]
    Inverted { from: String, to: String },
}
