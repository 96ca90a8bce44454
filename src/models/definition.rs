use serde::{Deserialize, Serialize};

/// Stored alert definition: points at the dashboard panel holding its queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDefinition {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub dashboard_id: i64,
    pub panel_id: i64,
}

/// Identity of the acting user, already authenticated by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedInUser {
    pub user_id: i64,
    pub org_id: i64,
    #[serde(default)]
    pub login: String,
}

impl SignedInUser {
    pub fn new(user_id: i64, org_id: i64) -> Self {
        Self {
            user_id,
            org_id,
            login: String::new(),
        }
    }
}
