//! alertng: alert condition evaluation
//!
//! Turns a stored alert definition into alert states for each monitored
//! series. Queries live on dashboard panels; evaluation resolves them,
//! runs them through a query backend and classifies the reduced results.
//!
//! # Pipeline
//!
//! - **Resolve**: definition → dashboard → panel targets → [`Conditions`]
//! - **Execute**: one backend dispatch, keeping the frames of the condition refId
//! - **Evaluate**: each single-value frame becomes `Normal` or `Critical`
//! - **Present**: the states as a one-row boolean table
//!
//! # Example
//!
//! ```no_run
//! use alertng::backend::{BackendConfig, HttpBackend};
//! use alertng::eval::{AlertNg, ExecContext};
//! use alertng::models::SignedInUser;
//! use alertng::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::load_file("fixtures.json")?);
//! let backend = Arc::new(HttpBackend::new(BackendConfig::default())?);
//! let alert = AlertNg::new(store.clone(), store.clone(), store, backend);
//!
//! let ctx = ExecContext::new(1, SignedInUser::new(7, 1));
//! let states = alert.evaluate_definition(&ctx, "now-5m", "now", false).await?;
//! println!("{}", alert.present(&states).string_table(10, 1));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod backend;
pub mod data;
pub mod eval;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use data::{Field, FieldValues, Frame, Labels, Value};
pub use eval::{AlertNg, Conditions, EvalError, EvalResult, ExecContext, State};
