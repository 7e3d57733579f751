use quillpost::{
    AppState,
    bootstrap::ensure_default_admin,
    config::{AppConfig, Env},
    create_router,
    repository::{BlogStoreState, PostgresRepository, UserStoreState},
};
use sqlx::postgres::PgPoolOptions;
use std::{process::ExitCode, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects and migrates the database, makes sure
/// the default admin exists, then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() -> ExitCode {
    // 1. Configuration (fail fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Logging: RUST_LOG wins, otherwise debug for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quillpost=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(config = ?config, "application starting in {:?} mode", config.env);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await?;

    let repo = Arc::new(PostgresRepository::new(pool));
    repo.initialize().await?;
    tracing::info!("database migrations applied");

    let users = repo.clone() as UserStoreState;
    let blogs = repo as BlogStoreState;

    // 4. Shared state; rejects an empty secret or a non-positive TTL.
    let app_state = AppState::new(config.clone(), users.clone(), blogs)?;

    // 5. Default admin
    ensure_default_admin(&users, &config.default_admin, app_state.credentials.clone()).await?;

    // 6. Router and server
    let app = create_router(app_state);
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Listening on {addr}");
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui",
        config.server_port
    );

    axum::serve(listener, app).await?;
    Ok(())
}
