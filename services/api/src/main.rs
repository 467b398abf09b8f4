use anyhow::Result;
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use timeclock_api::{
    config::AppConfig,
    jwt::TokenVerifier,
    routes,
    scheduler::start_period_generation,
    state::{AppState, Repositories},
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting timeclock API service");

    let config = AppConfig::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool, &MIGRATOR).await?;

    let state = AppState::new(
        Repositories::postgres(pool),
        TokenVerifier::new(&config.jwt()),
        config.generation_window(),
    )
    .with_trusted_proxy(config.server.trust_forwarded_for);

    let _scheduler = if config.payroll.scheduler_enabled {
        Some(
            start_period_generation(
                state.payroll.clone(),
                &config.payroll.generation_schedule,
                config.generation_window(),
            )
            .await?,
        )
    } else {
        info!("Payroll period scheduler disabled");
        None
    };

    // Start the web server
    let app = routes::create_router(state);

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Timeclock API listening on {}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
