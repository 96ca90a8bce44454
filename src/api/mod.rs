pub mod handlers;
pub mod server;

pub use handlers::{AppState, DatasourceCache};
pub use server::{build_router, run_server, ServerConfig};
