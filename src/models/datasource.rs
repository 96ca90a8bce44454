use serde::{Deserialize, Serialize};

/// Resolved datasource handle attached to every query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceRef {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    /// Plugin type, e.g. "prometheus"
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl DatasourceRef {
    pub fn new(id: i64, org_id: i64, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id,
            org_id,
            name: name.into(),
            kind: kind.into(),
        }
    }
}
