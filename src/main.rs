//! alertng server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - ALERTNG_HOST: Bind address (default: 0.0.0.0)
//! - ALERTNG_PORT: Port number (default: 8080)
//! - ALERTNG_EVAL_TIMEOUT_SECS: Deadline per evaluation request (default: 30)
//! - ALERTNG_DATASOURCE_CACHE_TTL_SECS: Datasource cache TTL (default: 5)
//! - ALERTNG_FIXTURES: JSON file with definitions, dashboards and datasources
//! - ALERTNG_BACKEND_URL: Query backend base URL (default: http://127.0.0.1:3000)
//! - ALERTNG_BACKEND_TIMEOUT_SECS: Query backend request timeout (default: 30)
//! - ALERTNG_BACKEND_USER / ALERTNG_BACKEND_PASSWORD: Optional basic auth
//! - RUST_LOG: Log level (default: info)

use alertng::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alertng=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    tracing::info!("alertng configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Eval timeout: {} seconds", config.eval_timeout_secs);
    tracing::info!(
        "  Datasource cache TTL: {} seconds",
        config.datasource_cache_ttl_secs
    );
    tracing::info!("  Query backend: {}", config.backend.base_url);
    match &config.fixtures {
        Some(path) => tracing::info!("  Fixtures: {}", path.display()),
        None => tracing::info!("  Fixtures: none"),
    }

    println!(
        r#"
 alertng: alert condition evaluation
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    run_server(config).await
}
