use entity_store::config::{AppConfig, LogFormat};
use entity_store::database::{establish_connection_pool, run_migrations};
use entity_store::{create_router, EntityRepository, EntityRepositoryImpl, EntityState};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.logger_format);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server stopped with error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "entity_store=debug,info".into());

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_file(true).with_line_number(true))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::debug!(?config, "Loaded configuration");

    // Pool setup blocks on the first connection, keep it off the async workers
    let db_config = config.database.clone();
    let pool = tokio::task::spawn_blocking(move || {
        let pool = establish_connection_pool(&db_config)?;
        if db_config.run_migrations {
            let applied = run_migrations(&pool)?;
            tracing::info!("Migrations up to date ({} applied)", applied);
        }
        Ok::<_, entity_store::RepositoryError>(pool)
    })
    .await??;

    let repository = Arc::new(EntityRepositoryImpl::new(pool.clone())) as Arc<dyn EntityRepository>;
    let state = EntityState::new(
        repository,
        Duration::from_secs(config.http.request_timeout_secs),
    );

    let app = create_router(state);

    let addr = config.http.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Entity store API running on http://{}", addr);
    tracing::info!("Swagger UI: http://{}/api/_/docs/swagger", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let (connections, idle) = pool.state();
    drop(pool);
    tracing::info!(connections, idle, "Database pool closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
