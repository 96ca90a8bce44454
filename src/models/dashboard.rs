//! Minimal dashboard schema: just enough to find a panel and read its targets

use serde::{Deserialize, Serialize};

use super::datasource::DatasourceRef;

/// Datasource name marking a target as a server-side expression
pub const EXPR_DATASOURCE: &str = "__expr__";

pub const DEFAULT_REF_ID: &str = "A";
pub const DEFAULT_ORG_ID: i64 = 0;
pub const DEFAULT_MAX_DATA_POINTS: i64 = 100;
pub const DEFAULT_INTERVAL_MS: i64 = 1000;

/// Dashboard as held by the dashboard store; `data` is the raw dashboard JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: i64,
    pub org_id: i64,
    pub data: serde_json::Value,
}

impl Dashboard {
    /// Decode the stored JSON into the minimal panel schema
    pub fn parse_panels(&self) -> Result<MinimalDashboard, serde_json::Error> {
        MinimalDashboard::deserialize(&self.data)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinimalDashboard {
    #[serde(default)]
    pub panels: Vec<Panel>,
}

/// Panel with its targets still raw; only the panel an alert points at is
/// ever decoded further
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    #[serde(default)]
    pub id: i64,
    /// Panel-level default datasource name
    #[serde(default, deserialize_with = "lenient::string")]
    pub datasource: Option<String>,
    #[serde(default, deserialize_with = "lenient::array")]
    pub targets: Vec<serde_json::Value>,
}

impl Panel {
    /// Decode the raw targets. Fails only on a target that is not an object.
    pub fn parse_targets(&self) -> Result<Vec<Target>, serde_json::Error> {
        self.targets
            .iter()
            .map(|raw| Target::deserialize(raw))
            .collect()
    }
}

/// One query or expression configured on a panel.
///
/// Fields the pipeline reads are typed; everything else is carried
/// verbatim in `model` and handed to the backend untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub ref_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub datasource: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::int",
        skip_serializing_if = "Option::is_none"
    )]
    pub datasource_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient::int",
        skip_serializing_if = "Option::is_none"
    )]
    pub org_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient::int",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_data_points: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient::int",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval_ms: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub query_type: Option<String>,
    #[serde(flatten)]
    pub model: serde_json::Map<String, serde_json::Value>,
}

impl Target {
    pub fn ref_id(&self) -> &str {
        self.ref_id.as_deref().unwrap_or(DEFAULT_REF_ID)
    }

    pub fn is_expression(&self) -> bool {
        self.datasource.as_deref() == Some(EXPR_DATASOURCE)
    }

    /// Copy of this target with unset fields filled from `ds` and the
    /// pipeline defaults. Fields already set are kept.
    pub fn with_defaults(&self, ds: &DatasourceRef) -> Target {
        Target {
            ref_id: self.ref_id.clone(),
            datasource: self.datasource.clone().or_else(|| Some(ds.name.clone())),
            datasource_id: self.datasource_id.or(Some(ds.id)),
            org_id: self.org_id.or(Some(DEFAULT_ORG_ID)),
            max_data_points: self.max_data_points.or(Some(DEFAULT_MAX_DATA_POINTS)),
            interval_ms: self.interval_ms.or(Some(DEFAULT_INTERVAL_MS)),
            query_type: self.query_type.clone(),
            model: self.model.clone(),
        }
    }

    /// Full JSON model: opaque payload plus the typed fields that are set
    pub fn to_model(&self) -> serde_json::Value {
        let mut model = self.model.clone();
        if let Some(ref_id) = &self.ref_id {
            model.insert("refId".into(), ref_id.clone().into());
        }
        if let Some(datasource) = &self.datasource {
            model.insert("datasource".into(), datasource.clone().into());
        }
        if let Some(id) = self.datasource_id {
            model.insert("datasourceId".into(), id.into());
        }
        if let Some(org_id) = self.org_id {
            model.insert("orgId".into(), org_id.into());
        }
        if let Some(points) = self.max_data_points {
            model.insert("maxDataPoints".into(), points.into());
        }
        if let Some(interval) = self.interval_ms {
            model.insert("intervalMs".into(), interval.into());
        }
        if let Some(query_type) = &self.query_type {
            model.insert("queryType".into(), query_type.clone().into());
        }
        serde_json::Value::Object(model)
    }
}

/// Deserializers tolerant of the loose typing found in stored dashboards.
/// A value of the wrong type reads as unset rather than failing the
/// dashboard.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Integer given as a number or a numeric string
    pub fn int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        })
    }

    /// Non-empty string
    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
    }

    /// JSON array, anything else reads as empty
    pub fn array<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }
}
