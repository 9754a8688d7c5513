use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use common::database;
use library_auth::{
    AppState,
    config::{Settings, StorageBackend},
    repositories::{
        AuditLogStore, MemoryAuditLogStore, MemoryUserStore, PgAuditLogStore, PgUserStore,
        UserStore,
    },
    routes,
    session::SessionCarrier,
};

type Stores = (Arc<dyn UserStore>, Arc<dyn AuditLogStore>);

async fn open_stores(backend: StorageBackend) -> Result<Stores> {
    match backend {
        StorageBackend::Postgres => {
            let db_config = database::DatabaseConfig::from_env()?;
            let pool = database::init_pool(&db_config).await?;

            // Check database connectivity
            if database::health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            Ok((
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgAuditLogStore::new(pool)),
            ))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on shutdown");
            Ok((
                Arc::new(MemoryUserStore::new()),
                Arc::new(MemoryAuditLogStore::new()),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    info!("Starting library authentication service");

    let settings = Settings::load()?;
    let secret = settings.signing_secret()?;
    info!("Signing secret loaded from {}", secret.source());

    let (users, audit_log) = open_stores(settings.storage.backend).await?;

    let sessions = SessionCarrier::new(
        settings.auth.cookie_name.clone(),
        settings.environment.is_production(),
    );
    let app_state = AppState::new(users, audit_log, secret.as_bytes(), sessions);

    let cors = routes::cors_layer(&settings.cors.allowed_origin)
        .with_context(|| format!("invalid CORS origin {:?}", settings.cors.allowed_origin))?;
    let app = routes::create_router(app_state, cors);

    let address = settings.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Authentication service listening on {}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
