use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use auth::config::{LogFormat, Settings, StorageBackend};
use auth::jwt::{JwtConfig, JwtService};
use auth::repositories::{MemoryStorage, PgStorage, Storage};
use auth::{AppState, routes};
use common::database;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;

    // Initialize logging
    init_tracing(settings.log_format)?;

    info!("Starting authentication service");

    let jwt_config = JwtConfig::from_settings(&settings);
    let jwt_service = JwtService::new(jwt_config)?;

    match settings.storage {
        StorageBackend::Postgres => {
            // Initialize database connection pool
            let db_config = database::DatabaseConfig::from_env()?;
            let pool = database::init_pool(&db_config).await?;

            // Check database connectivity
            if database::health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            database::run_migrations(&pool, &auth::MIGRATOR).await?;

            serve(PgStorage::new(pool), settings, jwt_service).await
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on shutdown");
            serve(MemoryStorage::new(), settings, jwt_service).await
        }
    }
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder().with_env_filter(filter);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

async fn serve<S: Storage>(storage: S, settings: Settings, jwt_service: JwtService) -> Result<()> {
    let app_state = AppState::new(Arc::new(storage), jwt_service, settings.admin_roles.clone());

    app_state
        .bootstrap_admin(
            settings.bootstrap_admin_role,
            settings.bootstrap_admin_user.as_deref(),
        )
        .await?;

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&settings.bind_address).await?;
    info!("Authentication service listening on {}", settings.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
