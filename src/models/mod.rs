//! Entities read from the definition, dashboard and datasource stores

pub mod dashboard;
pub mod definition;
pub mod datasource;

pub use dashboard::{
    Dashboard, MinimalDashboard, Panel, Target, DEFAULT_INTERVAL_MS, DEFAULT_MAX_DATA_POINTS,
    DEFAULT_ORG_ID, DEFAULT_REF_ID, EXPR_DATASOURCE,
};
pub use datasource::DatasourceRef;
pub use definition::{AlertDefinition, SignedInUser};
