use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::database::errors::RepositoryError;

/// Type alias for PostgreSQL connection pool
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Type alias for pooled connection
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Schema migrations compiled into the binary
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Connections reserved for `pg_cancel_backend`
const CANCEL_POOL_SIZE: u32 = 2;

/// Process-wide connection pool, created once at startup and injected
/// into the repository. Connections are closed when the last clone drops.
///
/// Cancellation requests use a separate small pool so they still go
/// through when every operation connection is checked out.
#[derive(Clone)]
pub struct DatabasePool {
    pool: Arc<PgPool>,
    cancel_pool: Arc<PgPool>,
}

impl DatabasePool {
    /// Wrap existing operation and cancellation pools
    pub fn new(pool: PgPool, cancel_pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            cancel_pool: Arc::new(cancel_pool),
        }
    }

    /// Check out a connection; it goes back to the pool when dropped
    pub fn get_conn(&self) -> Result<PgPooledConnection, RepositoryError> {
        self.pool
            .get()
            .map_err(|e| RepositoryError::ConnectionPoolError(e.to_string()))
    }

    /// Check out a connection for issuing cancellation requests
    pub(crate) fn get_cancel_conn(&self) -> Result<PgPooledConnection, RepositoryError> {
        self.cancel_pool
            .get()
            .map_err(|e| RepositoryError::ConnectionPoolError(e.to_string()))
    }

    /// Maximum number of connections the pool will open
    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }

    /// (open connections, idle connections)
    pub fn state(&self) -> (u32, u32) {
        let state = self.pool.state();
        (state.connections, state.idle_connections)
    }
}

/// Applies `statement_timeout` to every connection the pool opens
#[derive(Debug, Clone, Copy)]
struct StatementTimeout {
    millis: u64,
}

impl CustomizeConnection<PgConnection, r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!("SET statement_timeout = {}", self.millis))
            .map_err(r2d2::Error::QueryError)
    }
}

/// Establish the connection pool
///
/// # Arguments
/// * `config` - Connection parameters and pool bounds
///
/// # Returns
/// * `Result<DatabasePool, RepositoryError>` - Pool with one verified connection, or error
pub fn establish_connection_pool(config: &DatabaseConfig) -> Result<DatabasePool, RepositoryError> {
    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        "Establishing database connection pool..."
    );

    let database_url = config.database_url();
    let manager = ConnectionManager::<PgConnection>::new(database_url.clone());
    let mut builder = r2d2::Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(Duration::from_secs(config.connection_timeout_secs));

    if config.statement_timeout_ms > 0 {
        builder = builder.connection_customizer(Box::new(StatementTimeout {
            millis: config.statement_timeout_ms,
        }));
    }

    let pool = builder
        .build(manager)
        .map_err(|e| RepositoryError::ConnectionPoolError(e.to_string()))?;

    tracing::info!("Database pool created with max size: {}", config.pool_size);

    // Test connection
    let _ = pool
        .get()
        .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

    tracing::info!("Database connection successful");

    // Opened lazily, only once something is cancelled
    let cancel_pool = r2d2::Pool::builder()
        .max_size(CANCEL_POOL_SIZE)
        .min_idle(Some(0))
        .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
        .build_unchecked(ConnectionManager::<PgConnection>::new(database_url));

    Ok(DatabasePool::new(pool, cancel_pool))
}

/// Run pending embedded migrations, returning how many were applied
pub fn run_migrations(pool: &DatabasePool) -> Result<usize, RepositoryError> {
    let mut conn = pool.get_conn()?;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| RepositoryError::MigrationError(e.to_string()))?;

    for version in &applied {
        tracing::info!("Applied migration {}", version);
    }

    Ok(applied.len())
}
