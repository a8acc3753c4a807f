//! userhub API Server
//!
//! REST API server for user management with JWT authentication.

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use userhub_api::{create_router, state::AppState};
use userhub_core::config::{AppConfig, LoggingConfig};
use userhub_core::{InMemoryUserDirectory, PgUserDirectory, UserDirectory};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("userhub_api={0},userhub_core={0},audit=info,tower_http=debug", logging.level).into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration; a missing JWT secret is fatal
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config.logging);
    config.validate().context("Invalid configuration")?;

    let directory: Arc<dyn UserDirectory> = match &config.database.url {
        Some(url) => {
            let pg = PgUserDirectory::connect(url, config.database.pool_size)
                .await
                .context("Failed to open user database")?;
            tracing::info!("Using PostgreSQL user directory");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; users are kept in memory");
            Arc::new(InMemoryUserDirectory::new())
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(config, directory));

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("userhub API server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
